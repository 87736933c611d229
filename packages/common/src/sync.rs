//! State machine of a single CDN sync job message.
//!
//! ```text
//! Pending -> Attempting -> Succeeded
//!                       -> RetryScheduled -> Attempting
//!                       -> FailedPermanently
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

/// Why one upload attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
    /// Connection, network or service-side error; worth another attempt.
    #[error("Transient sync failure: {0}")]
    Transient(String),

    /// Anything else: configuration, credentials, unreadable local file.
    #[error("Permanent sync failure: {0}")]
    Permanent(String),
}

impl SyncFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Why a job ended in [`SyncState::FailedPermanently`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Transient failures until the retry bound was hit.
    RetriesExhausted { attempts: u32 },
    /// A failure that retrying cannot fix.
    NonTransient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Pending,
    Attempting { attempt: u32 },
    Succeeded,
    RetryScheduled { next_attempt: u32, delay: Duration },
    FailedPermanently { cause: FailureCause },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid sync transition: {event} from {from}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attempting { .. } => "attempting",
            Self::Succeeded => "succeeded",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::FailedPermanently { .. } => "failed_permanently",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedPermanently { .. })
    }

    /// Start an attempt.
    ///
    /// `Pending` starts at the given attempt number; `RetryScheduled` resumes
    /// with the attempt it scheduled.
    pub fn begin(&self, attempt: u32) -> Result<SyncState, InvalidTransition> {
        match self {
            Self::Pending => Ok(Self::Attempting { attempt }),
            Self::RetryScheduled { next_attempt, .. } => Ok(Self::Attempting {
                attempt: *next_attempt,
            }),
            other => Err(InvalidTransition {
                from: other.name(),
                event: "begin",
            }),
        }
    }

    /// Resolve the current attempt.
    pub fn finish(
        &self,
        outcome: Result<(), &SyncFailure>,
        policy: &RetryPolicy,
    ) -> Result<SyncState, InvalidTransition> {
        let Self::Attempting { attempt } = *self else {
            return Err(InvalidTransition {
                from: self.name(),
                event: "finish",
            });
        };

        Ok(match outcome {
            Ok(()) => Self::Succeeded,
            Err(SyncFailure::Transient(_)) if policy.allows_retry(attempt) => {
                Self::RetryScheduled {
                    next_attempt: attempt.saturating_add(1),
                    delay: policy.retry_delay,
                }
            }
            Err(SyncFailure::Transient(_)) => Self::FailedPermanently {
                cause: FailureCause::RetriesExhausted {
                    attempts: attempt.saturating_add(1),
                },
            },
            Err(SyncFailure::Permanent(_)) => Self::FailedPermanently {
                cause: FailureCause::NonTransient,
            },
        })
    }
}

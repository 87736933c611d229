use common::PlanError;
use common::audit::AuditError;
use common::storage::StorageError;
use common::sync::InvalidTransition;
use mq::MqError;
use thiserror::Error;

/// Failure of a single job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Source image unreadable at {path}: {reason}")]
    SourceImageUnreadable { path: String, reason: String },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] MqError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Fatal errors come from the job's own data and fail the same way on
    /// every delivery; they are acknowledged instead of redelivered.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceImageUnreadable { .. }
                | Self::InvalidJob(_)
                | Self::Encode { .. }
                | Self::Plan(_)
                | Self::Transition(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("MQ error: {0}")]
    Mq(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl From<MqError> for WorkerError {
    fn from(e: MqError) -> Self {
        WorkerError::Mq(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

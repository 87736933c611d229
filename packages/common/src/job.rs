use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditLevel;
use crate::mq::{Message, RoutingKey};
use crate::planner::DescriptorMap;
use crate::retry::RetryAttempt;
use crate::variant::ORIGINAL_LABEL;

/// Resize the original of `descriptors` into every other entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResizeJob {
    /// Job identifier (UUID)
    pub job_id: String,
    /// Original plus every target, keyed by label
    pub descriptors: DescriptorMap,
    /// Label of the entry holding the source image
    pub original_label: String,
}

impl ResizeJob {
    pub fn new(descriptors: DescriptorMap) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            descriptors,
            original_label: ORIGINAL_LABEL.to_string(),
        }
    }
}

impl Message for ResizeJob {
    fn message_type() -> &'static str {
        "resize_job"
    }

    fn message_id(&self) -> &str {
        &self.job_id
    }

    fn routing_key() -> RoutingKey {
        RoutingKey::Resize
    }
}

/// Append one record to the audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogJob {
    pub job_id: String,
    /// Severity name; unknown values are tolerated by the log worker.
    pub level: String,
    pub message: String,
}

impl LogJob {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            level: level.into(),
            message: message.into(),
        }
    }

    pub fn at(level: AuditLevel, message: impl Into<String>) -> Self {
        Self::new(level.as_str(), message)
    }
}

impl Message for LogJob {
    fn message_type() -> &'static str {
        "log_job"
    }

    fn message_id(&self) -> &str {
        &self.job_id
    }

    fn routing_key() -> RoutingKey {
        RoutingKey::Log
    }
}

/// Mirror a batch of derived files to the object store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CdnSyncJob {
    /// Stable across retries of the same batch
    pub job_id: String,
    pub descriptors: DescriptorMap,
    /// 0 for the first delivery, incremented by each scheduled retry
    pub attempt: u32,
    /// Failed attempts so far
    #[serde(default)]
    pub history: Vec<RetryAttempt>,
}

impl CdnSyncJob {
    pub fn new(descriptors: DescriptorMap) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            descriptors,
            attempt: 0,
            history: Vec::new(),
        }
    }

    /// The follow-up message after a failed attempt.
    pub fn retry(&self, error: impl Into<String>) -> Self {
        let mut history = self.history.clone();
        history.push(RetryAttempt::new(self.attempt, error));
        Self {
            job_id: self.job_id.clone(),
            descriptors: self.descriptors.clone(),
            attempt: self.attempt.saturating_add(1),
            history,
        }
    }
}

impl Message for CdnSyncJob {
    fn message_type() -> &'static str {
        "cdn_sync_job"
    }

    fn message_id(&self) -> &str {
        &self.job_id
    }

    fn routing_key() -> RoutingKey {
        RoutingKey::CdnSync
    }
}

/// Any pipeline job.
#[derive(Clone, Debug, PartialEq)]
pub enum Job {
    Resize(ResizeJob),
    Log(LogJob),
    CdnSync(CdnSyncJob),
}

impl Job {
    pub fn routing_key(&self) -> RoutingKey {
        match self {
            Self::Resize(_) => RoutingKey::Resize,
            Self::Log(_) => RoutingKey::Log,
            Self::CdnSync(_) => RoutingKey::CdnSync,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::Resize(job) => job.message_id(),
            Self::Log(job) => job.message_id(),
            Self::CdnSync(job) => job.message_id(),
        }
    }
}

impl From<ResizeJob> for Job {
    fn from(job: ResizeJob) -> Self {
        Self::Resize(job)
    }
}

impl From<LogJob> for Job {
    fn from(job: LogJob) -> Self {
        Self::Log(job)
    }
}

impl From<CdnSyncJob> for Job {
    fn from(job: CdnSyncJob) -> Self {
        Self::CdnSync(job)
    }
}

/// A job a handler wants delivered, optionally after a delay.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
    pub job: Job,
    pub delay: Option<Duration>,
}

impl Dispatch {
    pub fn now(job: impl Into<Job>) -> Self {
        Self {
            job: job.into(),
            delay: None,
        }
    }

    pub fn delayed(job: impl Into<Job>, delay: Duration) -> Self {
        Self {
            job: job.into(),
            delay: Some(delay).filter(|d| !d.is_zero()),
        }
    }

    pub fn routing_key(&self) -> RoutingKey {
        self.job.routing_key()
    }
}

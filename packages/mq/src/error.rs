use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Publish failed on queue {queue}: {reason}")]
    Publish { queue: String, reason: String },

    #[error("{0}")]
    Internal(String),
}

impl From<broccoli_queue::error::BroccoliError> for MqError {
    fn from(e: broccoli_queue::error::BroccoliError) -> Self {
        MqError::Internal(e.to_string())
    }
}

use std::time::Duration;

use crate::error::MqError;

pub type PublishConfig = broccoli_queue::queue::PublishOptions;

/// Publish options that hold a message back for `delay`.
pub fn delayed_publish(delay: Duration) -> Result<PublishConfig, MqError> {
    let delay = time::Duration::try_from(delay)
        .map_err(|e| MqError::Internal(format!("Delay out of range: {e}")))?;
    Ok(PublishConfig::builder().delay(delay).build())
}

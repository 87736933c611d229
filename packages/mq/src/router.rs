use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::MqAppConfig;
use common::{Dispatch, Job, Message};
use tracing::debug;

use crate::config::delayed_publish;
use crate::error::MqError;
use crate::models::MqQueue;

/// Delivers jobs to the worker pools.
///
/// Delivery is at-least-once and unordered; handlers must be idempotent.
#[async_trait]
pub trait QueueRouter: Send + Sync {
    async fn enqueue(&self, dispatch: Dispatch) -> Result<(), MqError>;

    /// Enqueue every dispatch, stopping at the first failure.
    async fn enqueue_all(&self, dispatches: Vec<Dispatch>) -> Result<(), MqError> {
        for dispatch in dispatches {
            self.enqueue(dispatch).await?;
        }
        Ok(())
    }
}

/// Router backed by the Redis queue, one queue per routing key.
pub struct MqRouter {
    mq: Arc<MqQueue>,
    queues: MqAppConfig,
}

impl MqRouter {
    pub fn new(mq: Arc<MqQueue>, queues: MqAppConfig) -> Self {
        Self { mq, queues }
    }

    async fn publish<M: Message>(&self, message: &M, delay: Option<Duration>) -> Result<(), MqError> {
        let queue = self.queues.queue_name(M::routing_key());
        let options = delay.map(delayed_publish).transpose()?;

        self.mq
            .publish(queue, None, message, options)
            .await
            .map_err(|e| MqError::Publish {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            queue,
            message_type = M::message_type(),
            message_id = %message.message_id(),
            delay_ms = delay.map(|d| d.as_millis() as u64),
            "Published job"
        );
        Ok(())
    }
}

#[async_trait]
impl QueueRouter for MqRouter {
    async fn enqueue(&self, dispatch: Dispatch) -> Result<(), MqError> {
        match &dispatch.job {
            Job::Resize(job) => self.publish(job, dispatch.delay).await,
            Job::Log(job) => self.publish(job, dispatch.delay).await,
            Job::CdnSync(job) => self.publish(job, dispatch.delay).await,
        }
    }
}

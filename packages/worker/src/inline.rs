use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use common::Dispatch;
use mq::{MqError, QueueRouter};
use tracing::{debug, warn};

use crate::pipeline::Pipeline;

/// Runs jobs in the calling task instead of publishing them.
///
/// Every emitted job is drained before `enqueue` returns, in FIFO order.
/// Delayed dispatches sleep for their delay. Failed jobs are not redelivered.
pub struct InlineRouter {
    pipeline: Arc<Pipeline>,
}

impl InlineRouter {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl QueueRouter for InlineRouter {
    async fn enqueue(&self, dispatch: Dispatch) -> Result<(), MqError> {
        let mut pending = VecDeque::from([dispatch]);

        while let Some(Dispatch { job, delay }) = pending.pop_front() {
            if let Some(delay) = delay {
                debug!(routing_key = %job.routing_key(), delay_ms = delay.as_millis() as u64, "Waiting before inline job");
                tokio::time::sleep(delay).await;
            }

            let job_id = job.job_id().to_string();
            match self.pipeline.handle(job).await {
                Ok(next) => pending.extend(next),
                Err(e) => warn!(job_id = %job_id, error = %e, "Inline job failed"),
            }
        }
        Ok(())
    }
}

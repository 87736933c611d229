use std::sync::Arc;

use common::{Job, Message};
use mq::{BroccoliError, BrokerMessage, Mq, QueueRouter};
use tracing::{debug, info};

use crate::pipeline::Pipeline;

/// Consume one queue until the broker stops delivering.
///
/// `M` picks the message type carried by `queue`.
pub async fn consume<M>(
    mq: Arc<Mq>,
    queue: String,
    concurrency: usize,
    pipeline: Arc<Pipeline>,
    router: Arc<dyn QueueRouter>,
) -> Result<(), BroccoliError>
where
    M: Message + Into<Job> + 'static,
{
    info!(queue = %queue, message_type = M::message_type(), concurrency, "Consumer started");

    mq.process_messages(
        &queue,
        Some(concurrency),
        None,
        move |message: BrokerMessage<M>| {
            let pipeline = Arc::clone(&pipeline);
            let router = Arc::clone(&router);
            async move { process_message(message.payload.into(), &pipeline, router.as_ref()).await }
        },
    )
    .await
}

/// Handle one delivered job and publish what it emits.
///
/// Fatal job errors are acknowledged, everything else is handed back to the
/// broker for redelivery.
pub async fn process_message(
    job: Job,
    pipeline: &Pipeline,
    router: &dyn QueueRouter,
) -> Result<(), BroccoliError> {
    let job_id = job.job_id().to_string();

    match pipeline.handle(job).await {
        Ok(dispatches) => {
            debug!(job_id = %job_id, emitted = dispatches.len(), "Job done");
            router
                .enqueue_all(dispatches)
                .await
                .map_err(|e| BroccoliError::Publish(format!("Failed to publish follow-up jobs: {e}")))
        }
        Err(e) if e.is_fatal() => Ok(()),
        Err(e) => Err(BroccoliError::Job(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::audit::MemoryAuditSink;
    use common::storage::FilesystemObjectStore;
    use common::{AuditLevel, DescriptorMap, Dispatch, LogJob, ResizeJob, RetryPolicy};
    use mq::MqError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Dispatch>>);

    #[async_trait]
    impl QueueRouter for Recorder {
        async fn enqueue(&self, dispatch: Dispatch) -> Result<(), MqError> {
            self.0.lock().unwrap().push(dispatch);
            Ok(())
        }
    }

    async fn pipeline() -> (Pipeline, Arc<MemoryAuditSink>, tempfile::TempDir) {
        let audit = Arc::new(MemoryAuditSink::new());
        let mirror = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(mirror.path()).await.unwrap();
        let pipeline = Pipeline::new(audit.clone(), Arc::new(store), RetryPolicy::default());
        (pipeline, audit, mirror)
    }

    #[tokio::test]
    async fn fatal_job_is_acknowledged() {
        let (pipeline, audit, _mirror) = pipeline().await;
        let router = Recorder::default();

        let result =
            process_message(ResizeJob::new(DescriptorMap::new()).into(), &pipeline, &router).await;

        assert!(result.is_ok());
        assert!(router.0.lock().unwrap().is_empty());
        assert_eq!(audit.records_at(AuditLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn log_job_is_acknowledged() {
        let (pipeline, audit, _mirror) = pipeline().await;
        let router = Recorder::default();

        process_message(LogJob::at(AuditLevel::Info, "ok").into(), &pipeline, &router)
            .await
            .unwrap();

        assert_eq!(audit.records().len(), 1);
    }
}

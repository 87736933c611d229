use std::sync::Arc;

use common::audit::{FileAuditSink, TracingAuditSink};
use common::storage::s3::S3ObjectStore;
use common::storage::{FilesystemObjectStore, ObjectStore};
use common::{AuditLevel, AuditRecord, AuditSink, Dispatch, Job, RetryPolicy};
use tracing::{error, info, warn};

use crate::config::{CdnBackend, WorkerAppConfig};
use crate::error::{JobError, Result};
use crate::handlers::{handle_cdn_sync, handle_log, handle_resize};

/// Everything the job handlers need, shared by all channels of a process.
pub struct Pipeline {
    audit: Arc<dyn AuditSink>,
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(audit: Arc<dyn AuditSink>, store: Arc<dyn ObjectStore>, retry: RetryPolicy) -> Self {
        Self {
            audit,
            store,
            retry,
        }
    }

    /// Build the audit sink and object store named by the configuration.
    pub async fn from_config(config: &WorkerAppConfig) -> Result<Self> {
        let audit: Arc<dyn AuditSink> = match &config.pipeline.audit_log {
            Some(path) => Arc::new(FileAuditSink::open(path)?),
            None => Arc::new(TracingAuditSink),
        };

        let store: Arc<dyn ObjectStore> = match config.cdn.backend {
            CdnBackend::Filesystem => {
                Arc::new(FilesystemObjectStore::new(&config.cdn.mirror_dir).await?)
            }
            CdnBackend::S3 => Arc::new(S3ObjectStore::from_config(&config.cdn)?),
        };

        info!(
            backend = store.backend(),
            max_retries = config.pipeline.max_retries,
            retry_delay_secs = config.pipeline.retry_delay_secs,
            "Pipeline ready"
        );
        Ok(Self::new(audit, store, config.pipeline.retry_policy()))
    }

    /// Run one job and return the jobs it emits.
    ///
    /// Fatal errors are written to the audit log before being returned.
    pub async fn handle(&self, job: Job) -> std::result::Result<Vec<Dispatch>, JobError> {
        let routing_key = job.routing_key();
        let job_id = job.job_id().to_string();

        let result = match job {
            Job::Resize(job) => handle_resize(job).await,
            Job::Log(job) => {
                handle_log(job, self.audit.as_ref()).await;
                Ok(Vec::new())
            }
            Job::CdnSync(job) => handle_cdn_sync(job, self.store.as_ref(), &self.retry)
                .await
                .map(|report| report.dispatches),
        };

        if let Err(e) = &result {
            if e.is_fatal() {
                error!(%routing_key, job_id = %job_id, error = %e, "Job failed permanently");
                let record = AuditRecord::new(
                    AuditLevel::Error,
                    format!("{routing_key} job {job_id} failed: {e}"),
                );
                if let Err(audit_err) = self.audit.append(record).await {
                    warn!(error = %audit_err, "Failed to append audit record");
                }
            } else {
                warn!(%routing_key, job_id = %job_id, error = %e, "Job failed, leaving it for redelivery");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::LogJob;
    use common::audit::MemoryAuditSink;
    use common::{DescriptorMap, ResizeJob};

    async fn pipeline(audit: Arc<MemoryAuditSink>) -> (Pipeline, tempfile::TempDir) {
        let mirror = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(mirror.path()).await.unwrap();
        (
            Pipeline::new(audit, Arc::new(store), RetryPolicy::default()),
            mirror,
        )
    }

    #[tokio::test]
    async fn log_jobs_reach_the_sink() {
        let audit = Arc::new(MemoryAuditSink::new());
        let (pipeline, _mirror) = pipeline(Arc::clone(&audit)).await;

        let emitted = pipeline
            .handle(LogJob::at(AuditLevel::Info, "hello").into())
            .await
            .unwrap();

        assert!(emitted.is_empty());
        assert_eq!(audit.records_at(AuditLevel::Info).len(), 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_audited() {
        let audit = Arc::new(MemoryAuditSink::new());
        let (pipeline, _mirror) = pipeline(Arc::clone(&audit)).await;

        let err = pipeline
            .handle(ResizeJob::new(DescriptorMap::new()).into())
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        let errors = audit.records_at(AuditLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("resize job "));
    }
}

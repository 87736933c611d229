use common::storage::{MalformedStoragePath, ObjectStore, remote_key};
use common::{
    AuditLevel, CdnSyncJob, Dispatch, FailureCause, LogJob, RetryPolicy, SyncFailure, SyncState,
};
use tracing::{error, info, instrument, warn};

use crate::error::JobError;

/// Outcome of one CDN sync attempt.
#[derive(Debug)]
pub struct SyncReport {
    /// Terminal state, or `RetryScheduled`.
    pub state: SyncState,
    /// Keys uploaded during this attempt.
    pub uploaded: Vec<String>,
    /// Descriptors left out of the batch.
    pub skipped: Vec<MalformedStoragePath>,
    /// Follow-up jobs: audit records and possibly the delayed retry.
    pub dispatches: Vec<Dispatch>,
}

/// Upload every derived file of the batch under its `YYYY/MM/DD/<file>` key.
///
/// A transient failure schedules the same batch again after
/// `policy.retry_delay`, until `policy.max_retries` retries have been spent.
/// A non-transient failure ends the job at once. Descriptors whose path has
/// no date partition are skipped with a warning and do not fail the batch.
#[instrument(skip_all, fields(job_id = %job.job_id, attempt = job.attempt, backend = store.backend()))]
pub async fn handle_cdn_sync(
    job: CdnSyncJob,
    store: &dyn ObjectStore,
    policy: &RetryPolicy,
) -> Result<SyncReport, JobError> {
    let attempting = SyncState::Pending.begin(job.attempt)?;

    let mut uploaded = Vec::new();
    let mut skipped = Vec::new();
    let outcome = upload_batch(&job, store, &mut uploaded, &mut skipped).await;
    let state = attempting.finish(outcome.as_ref().map(|_| ()), policy)?;

    let mut dispatches: Vec<Dispatch> = skipped
        .iter()
        .map(|s| {
            Dispatch::now(LogJob::at(
                AuditLevel::Warning,
                format!("Skipping CDN sync of {}: no date partition in path", s.path),
            ))
        })
        .collect();

    match (&state, outcome) {
        (SyncState::Succeeded, _) => {
            info!(uploaded = uploaded.len(), skipped = skipped.len(), "CDN sync completed");
            dispatches.push(Dispatch::now(LogJob::at(
                AuditLevel::Info,
                format!(
                    "Synced {} images to {} (batch {})",
                    uploaded.len(),
                    store.backend(),
                    job.job_id
                ),
            )));
        }
        (SyncState::RetryScheduled { next_attempt, delay }, Err(failure)) => {
            warn!(
                next_attempt,
                delay_secs = delay.as_secs(),
                error = %failure,
                "CDN sync failed, retry scheduled"
            );
            dispatches.push(Dispatch::now(LogJob::at(
                AuditLevel::Warning,
                format!(
                    "CDN sync of batch {} failed on attempt {}, retrying in {}s: {failure}",
                    job.job_id,
                    job.attempt.saturating_add(1),
                    delay.as_secs()
                ),
            )));
            dispatches.push(Dispatch::delayed(job.retry(failure.to_string()), *delay));
        }
        (SyncState::FailedPermanently { cause }, Err(failure)) => {
            let message = match cause {
                FailureCause::RetriesExhausted { attempts } => format!(
                    "CDN sync of batch {} gave up after {attempts} attempts: {failure}{}",
                    job.job_id,
                    earlier_failures(&job)
                ),
                FailureCause::NonTransient => format!(
                    "CDN sync of batch {} failed with a non-retryable error: {failure}",
                    job.job_id
                ),
            };
            error!(cause = ?cause, error = %failure, "CDN sync failed permanently");
            dispatches.push(Dispatch::now(LogJob::at(AuditLevel::Error, message)));
        }
        (other, _) => {
            return Err(JobError::Internal(format!(
                "unexpected sync state after attempt: {}",
                other.name()
            )));
        }
    }

    Ok(SyncReport {
        state,
        uploaded,
        skipped,
        dispatches,
    })
}

fn earlier_failures(job: &CdnSyncJob) -> String {
    if job.history.is_empty() {
        return String::new();
    }
    let attempts = job
        .history
        .iter()
        .map(|a| {
            format!(
                "#{} at {}: {}",
                a.attempt.saturating_add(1),
                a.timestamp.to_rfc3339(),
                a.error
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    format!(" (earlier: {attempts})")
}

async fn upload_batch(
    job: &CdnSyncJob,
    store: &dyn ObjectStore,
    uploaded: &mut Vec<String>,
    skipped: &mut Vec<MalformedStoragePath>,
) -> Result<(), SyncFailure> {
    for descriptor in job.descriptors.values() {
        let key = match remote_key(&descriptor.path) {
            Ok(key) => key,
            Err(malformed) => {
                warn!(path = %malformed.path, "No date partition in path, skipping");
                skipped.push(malformed);
                continue;
            }
        };

        let data = tokio::fs::read(&descriptor.path).await.map_err(|e| {
            SyncFailure::Permanent(format!("cannot read {}: {e}", descriptor.path.display()))
        })?;

        store.put_object(&key, data).await?;
        uploaded.push(key);
    }
    Ok(())
}

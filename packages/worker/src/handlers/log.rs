use common::{AuditLevel, AuditRecord, AuditSink, LogJob};
use tracing::warn;

/// Append the job's message to the audit log.
///
/// An unrecognized level is not an error: the message is kept and recorded
/// as a warning that names the bad level. Sink failures are reported to
/// `tracing` and swallowed.
pub async fn handle_log(job: LogJob, sink: &dyn AuditSink) {
    let record = match job.level.parse::<AuditLevel>() {
        Ok(level) => AuditRecord::new(level, job.message),
        Err(_) => AuditRecord::new(
            AuditLevel::Warning,
            format!("Log level given '{}' is invalid: {}", job.level, job.message),
        ),
    };

    if let Err(e) = sink.append(record).await {
        warn!(job_id = %job.job_id, error = %e, "Failed to append audit record");
    }
}

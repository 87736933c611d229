pub mod audit;
pub mod config;
pub mod job;
pub mod mq;
pub mod naming;
pub mod planner;
pub mod retry;
pub mod storage;
pub mod sync;
pub mod variant;

pub use audit::{AuditLevel, AuditRecord, AuditSink};
pub use job::{CdnSyncJob, Dispatch, Job, LogJob, ResizeJob};
pub use mq::{Message, RoutingKey};
pub use planner::{Asset, DerivedAssetDescriptor, DescriptorMap, PlanError, plan};
pub use retry::{RetryAttempt, RetryPolicy};
pub use sync::{FailureCause, SyncFailure, SyncState};
pub use variant::{ORIGINAL_LABEL, Size, VariantSpec};

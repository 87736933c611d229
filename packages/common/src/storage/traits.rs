use async_trait::async_trait;

use crate::sync::SyncFailure;

/// Remote object store with a single put-object capability.
///
/// Backends classify their own failures: [`SyncFailure::Transient`] for
/// connection, network and service errors, [`SyncFailure::Permanent`] for
/// everything retrying cannot fix. Putting an existing key overwrites it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), SyncFailure>;
}

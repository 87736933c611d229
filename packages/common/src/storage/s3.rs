use std::time::Duration;

use async_trait::async_trait;
use ::s3::creds::Credentials;
use ::s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::traits::ObjectStore;
use crate::config::CdnConfig;
use crate::sync::SyncFailure;

/// S3-compatible object store.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    timeout: Duration,
}

impl S3ObjectStore {
    pub fn from_config(config: &CdnConfig) -> Result<Self, StorageError> {
        let region = if config.endpoint.is_empty() {
            config
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Config(format!("invalid region: {e}")))?
        } else {
            Region::Custom {
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
            }
        };

        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        let access_key = non_empty(&config.access_key);
        let secret_key = non_empty(&config.secret_key);
        let credentials = Credentials::new(
            access_key.as_deref(),
            secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Config(format!("invalid bucket: {e}")))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

/// Status codes worth retrying: timeouts, throttling and server errors.
fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), SyncFailure> {
        let response = tokio::time::timeout(self.timeout, self.bucket.put_object(key, &data))
            .await
            .map_err(|_| {
                SyncFailure::Transient(format!("upload of {key} timed out after {:?}", self.timeout))
            })?
            // Transport, signing and service errors all land here.
            .map_err(|e| SyncFailure::Transient(format!("upload of {key} failed: {e}")))?;

        let status = response.status_code();
        debug!(key, status, bytes = data.len(), "S3 put_object");

        match status {
            200..=299 => Ok(()),
            s if is_transient_status(s) => Err(SyncFailure::Transient(format!(
                "upload of {key} returned HTTP {s}"
            ))),
            s => Err(SyncFailure::Permanent(format!(
                "upload of {key} rejected with HTTP {s}"
            ))),
        }
    }
}

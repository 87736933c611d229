use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::mq::RoutingKey;
use crate::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};
use crate::variant::{VariantSpec, default_variants};

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue carrying resize jobs. Default: "resize".
    #[serde(default = "default_resize_queue_name")]
    pub resize_queue_name: String,
    /// Queue carrying audit log jobs. Default: "log".
    #[serde(default = "default_log_queue_name")]
    pub log_queue_name: String,
    /// Queue carrying CDN sync jobs. Default: "cdn-sync".
    #[serde(default = "default_cdn_sync_queue_name")]
    pub cdn_sync_queue_name: String,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_resize_queue_name() -> String {
    RoutingKey::Resize.as_str().into()
}
fn default_log_queue_name() -> String {
    RoutingKey::Log.as_str().into()
}
fn default_cdn_sync_queue_name() -> String {
    RoutingKey::CdnSync.as_str().into()
}

impl MqAppConfig {
    /// Queue name bound to a routing key.
    pub fn queue_name(&self, key: RoutingKey) -> &str {
        match key {
            RoutingKey::Resize => &self.resize_queue_name,
            RoutingKey::Log => &self.log_queue_name,
            RoutingKey::CdnSync => &self.cdn_sync_queue_name,
        }
    }
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            resize_queue_name: default_resize_queue_name(),
            log_queue_name: default_log_queue_name(),
            cdn_sync_queue_name: default_cdn_sync_queue_name(),
        }
    }
}

/// Derivative generation settings.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Root of the shared media tree. Default: "./media".
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// JSON-lines audit log. Records go to `tracing` when unset.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    /// Retries after the first CDN sync attempt. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds between CDN sync attempts. Default: 60.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Derivative targets. Default: thumbnail, small, medium, large.
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantSpec>,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_delay_secs() -> u64 {
    60
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            audit_log: None,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            variants: default_variants(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CdnBackend {
    /// S3-compatible bucket (requires the `object-storage` feature).
    S3,
    /// Local directory mirror, for development.
    Filesystem,
}

/// Remote object store settings.
#[derive(Debug, Deserialize, Clone)]
pub struct CdnConfig {
    /// Default: filesystem.
    #[serde(default = "default_cdn_backend")]
    pub backend: CdnBackend,
    /// Default: "sync-images".
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3 endpoint; AWS when empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub path_style: bool,
    /// Static access key; the provider chain is used when empty.
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Target directory of the filesystem backend. Default: "./cdn-mirror".
    #[serde(default = "default_mirror_dir")]
    pub mirror_dir: PathBuf,
    /// Per-object upload timeout in seconds. Default: 30.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cdn_backend() -> CdnBackend {
    CdnBackend::Filesystem
}
fn default_bucket() -> String {
    "sync-images".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_mirror_dir() -> PathBuf {
    PathBuf::from("./cdn-mirror")
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            backend: default_cdn_backend(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint: String::new(),
            path_style: false,
            access_key: String::new(),
            secret_key: String::new(),
            mirror_dir: default_mirror_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

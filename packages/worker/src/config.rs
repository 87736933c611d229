use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use common::RoutingKey;
pub use common::config::{CdnBackend, CdnConfig, MqAppConfig, PipelineConfig};

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Concurrent jobs per consumed channel. Default: 4.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Channels this process consumes. Default: all of them.
    #[serde(default = "default_channels")]
    pub channels: Vec<RoutingKey>,
}

fn default_worker_id() -> String {
    "worker-1".into()
}
fn default_concurrency() -> usize {
    4
}
fn default_channels() -> Vec<RoutingKey> {
    RoutingKey::ALL.to_vec()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            concurrency: default_concurrency(),
            channels: default_channels(),
        }
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cdn: CdnConfig,
}

impl WorkerAppConfig {
    /// Defaults, then `$IMGPIPE_CONFIG` (or `config/config`), then
    /// `IMGPIPE__SECTION__KEY` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("IMGPIPE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("worker.id", "worker-1")?
            .set_default("worker.concurrency", 4_i64)?
            .set_default("mq.url", "redis://localhost:6379")?
            .set_default("mq.pool_size", 5_i64)?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("IMGPIPE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

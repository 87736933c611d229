pub mod config;
pub mod error;
pub mod models;
pub mod router;

pub use config::PublishConfig;
pub use error::MqError;
pub use models::{BrokerMessage, BroccoliError, MqConfig, MqQueue, init_mq};
pub use router::{MqRouter, QueueRouter};

pub type Mq = MqQueue;

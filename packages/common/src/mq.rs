use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Core trait for all MQ messages
pub trait Message: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + Clone {
    fn message_type() -> &'static str
    where
        Self: Sized;

    fn message_id(&self) -> &str;

    /// Channel this message is delivered on.
    fn routing_key() -> RoutingKey
    where
        Self: Sized;
}

/// The three delivery channels of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingKey {
    #[serde(rename = "resize")]
    Resize,
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "cdn-sync")]
    CdnSync,
}

impl RoutingKey {
    pub const ALL: [RoutingKey; 3] = [Self::Resize, Self::Log, Self::CdnSync];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Log => "log",
            Self::CdnSync => "cdn-sync",
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoutingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resize" => Ok(Self::Resize),
            "log" => Ok(Self::Log),
            "cdn-sync" | "cdn_sync" => Ok(Self::CdnSync),
            _ => Err(format!(
                "Invalid routing key '{}'. Must be 'resize', 'log' or 'cdn-sync'",
                s
            )),
        }
    }
}

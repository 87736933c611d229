pub mod config;
pub mod consumer;
pub mod error;
pub mod handlers;
pub mod inline;
pub mod pipeline;
pub mod upload;

pub use config::{WorkerAppConfig, WorkerConfig};
pub use error::{JobError, Result, WorkerError};
pub use inline::InlineRouter;
pub use pipeline::Pipeline;
pub use upload::{UploadError, UploadRequest, delete_asset, on_upload, submit, validate_upload};

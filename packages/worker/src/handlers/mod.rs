pub mod cdn_sync;
pub mod log;
pub mod resize;

pub use cdn_sync::{SyncReport, handle_cdn_sync};
pub use log::handle_log;
pub use resize::handle_resize;

mod error;
mod key;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::{MalformedStoragePath, StorageError};
pub use filesystem::{FilesystemObjectStore, MediaStore, remove_file, write_atomic};
pub use key::remote_key;
pub use traits::ObjectStore;

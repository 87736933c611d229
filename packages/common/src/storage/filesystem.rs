use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::fs;

use super::error::StorageError;
use super::traits::ObjectStore;
use crate::sync::SyncFailure;

/// Top-level directory of the media tree under the root.
pub const IMAGES_DIR: &str = "images";

/// Write `data` to `path` through a temporary sibling and a rename.
///
/// Readers see either the previous file or the complete new one. Parent
/// directories are created as needed; an existing file is replaced.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
    let temp_path = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    if let Err(e) = fs::write(&temp_path, data).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}

/// Remove a file. Returns `false` if it did not exist.
pub async fn remove_file(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// The shared media tree: `{root}/images/YYYY/MM/DD/<name>`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Open the media tree, creating the root if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Date partition for files encoded at `at` (UTC).
    pub fn dated_dir(&self, at: DateTime<Utc>) -> PathBuf {
        self.root
            .join(IMAGES_DIR)
            .join(format!("{:04}", at.year()))
            .join(format!("{:02}", at.month()))
            .join(format!("{:02}", at.day()))
    }

    /// Store an original under its encoded name. Returns the full path.
    pub async fn store_original(
        &self,
        name: &str,
        at: DateTime<Utc>,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.dated_dir(at).join(name);
        write_atomic(&path, data).await?;
        Ok(path)
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Object store that mirrors uploads into a local directory under their keys.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
}

impl FilesystemObjectStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(self.base_path.clone(), |path, part| path.join(part))
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), SyncFailure> {
        write_atomic(&self.object_path(key), &data)
            .await
            .map_err(|e| match e {
                StorageError::Io(ref io)
                    if matches!(
                        io.kind(),
                        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
                    ) =>
                {
                    SyncFailure::Transient(e.to_string())
                }
                other => SyncFailure::Permanent(other.to_string()),
            })
    }
}

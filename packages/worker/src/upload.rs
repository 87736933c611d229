//! Ingestion of uploaded originals and submission of their resize work.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use common::naming::{self, NamingError};
use common::storage::{MediaStore, StorageError, remove_file};
use common::{Asset, DescriptorMap, Dispatch, PlanError, ResizeJob, Size, VariantSpec, plan};
use image::{ImageFormat, ImageOutputFormat};
use mq::{MqError, QueueRouter};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{}", .0.message())]
    InvalidFilename(FilenameError),

    #[error("Upload is empty")]
    EmptyPayload,

    #[error("Upload is not a readable image: {0}")]
    NotAnImage(String),

    #[error("Unsupported image extension: '{0}'")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Dispatch(#[from] MqError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameError {
    Empty,
    ContainsPathSeparator,
    PathTraversal,
    ControlCharacter,
    Hidden,
}

impl FilenameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '..' is not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
            Self::Hidden => "Invalid filename: hidden files (starting with '.') are not allowed",
        }
    }
}

/// An image as received from a client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub owner_id: u64,
    pub original_filename: String,
    pub received_at: DateTime<Utc>,
}

/// Validates a flat filename (no directory components allowed).
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    // NUL is an ASCII control character.
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// Checks run before anything touches the media tree.
pub fn validate_upload(request: &UploadRequest) -> Result<(), UploadError> {
    let filename =
        validate_flat_filename(&request.original_filename).map_err(UploadError::InvalidFilename)?;
    let (_, ext) = naming::split_filename(filename)?;
    // Derived files keep the original's extension, so it must be encodable.
    let writable = ImageFormat::from_extension(ext)
        .is_some_and(|f| !matches!(ImageOutputFormat::from(f), ImageOutputFormat::Unsupported(_)));
    if !writable {
        return Err(UploadError::UnsupportedFormat(ext.to_string()));
    }
    if request.bytes.is_empty() {
        return Err(UploadError::EmptyPayload);
    }
    Ok(())
}

/// Pixel size of an encoded image, read from its header.
pub fn probe_size(bytes: &[u8]) -> Result<Size, UploadError> {
    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| UploadError::NotAnImage(e.to_string()))?;
    let dimensions = reader
        .into_dimensions()
        .map_err(|e| UploadError::NotAnImage(e.to_string()))?;
    Ok(Size::from(dimensions))
}

/// Validate an upload and store it as a new asset.
///
/// The original lands at `<root>/images/YYYY/MM/DD/<encoded name>` and is
/// written atomically.
#[instrument(skip_all, fields(owner_id = request.owner_id, filename = %request.original_filename))]
pub async fn on_upload(request: UploadRequest, media: &MediaStore) -> Result<Asset, UploadError> {
    validate_upload(&request)?;
    let original_size = probe_size(&request.bytes)?;

    let filename = request.original_filename.trim();
    let name = naming::encode(filename, request.owner_id, request.received_at)?;
    let storage_path = media
        .store_original(&name, request.received_at, &request.bytes)
        .await?;

    info!(name = %name, size = %original_size, "Original stored");
    Ok(Asset {
        name,
        owner_id: request.owner_id,
        storage_path,
        original_size,
    })
}

/// Plan the asset's derivatives and hand them to the resize channel.
///
/// Returns the full descriptor map. Nothing is enqueued when no variants
/// are configured.
pub async fn submit(
    asset: &Asset,
    variants: &[VariantSpec],
    router: &dyn QueueRouter,
) -> Result<DescriptorMap, UploadError> {
    let descriptors = plan(asset, variants)?;

    if variants.is_empty() {
        debug!(name = %asset.name, "No variants configured, nothing to resize");
    } else {
        router
            .enqueue(Dispatch::now(ResizeJob::new(descriptors.clone())))
            .await?;
    }
    Ok(descriptors)
}

/// Remove an asset's original and every derived file it would have.
///
/// Returns how many files were actually removed.
pub async fn delete_asset(asset: &Asset, variants: &[VariantSpec]) -> Result<usize, UploadError> {
    let descriptors = plan(asset, variants)?;

    let mut removed = 0;
    for descriptor in descriptors.values() {
        if remove_file(&descriptor.path).await? {
            removed += 1;
        }
    }

    info!(name = %asset.name, removed, "Asset deleted");
    Ok(removed)
}

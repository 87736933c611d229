use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use common::storage::write_atomic;
use common::{AuditLevel, CdnSyncJob, DerivedAssetDescriptor, Dispatch, LogJob, ResizeJob};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use tracing::{debug, info, instrument};

use crate::error::JobError;

const JPEG_QUALITY: u8 = 85;

/// Render every non-original descriptor of the job from its original.
///
/// Each target is written atomically, so a redelivered job overwrites the
/// previous output with identical content. Emits one info [`LogJob`] per
/// written file and a single [`CdnSyncJob`] for the batch.
#[instrument(skip_all, fields(job_id = %job.job_id, targets = job.descriptors.len().saturating_sub(1)))]
pub async fn handle_resize(job: ResizeJob) -> Result<Vec<Dispatch>, JobError> {
    let mut targets = job.descriptors;
    let original = targets.remove(&job.original_label).ok_or_else(|| {
        JobError::InvalidJob(format!(
            "descriptor '{}' of the source image is missing",
            job.original_label
        ))
    })?;
    if targets.is_empty() {
        return Err(JobError::InvalidJob("no variants to generate".into()));
    }

    // Nothing is written unless every target can be rendered.
    let outputs = targets
        .values()
        .map(output_format)
        .collect::<Result<Vec<_>, _>>()?;

    let source = Arc::new(load_image(&original.path).await?);
    let (width, height) = source.dimensions();
    debug!(width, height, path = %original.path.display(), "Loaded source image");

    let mut dispatches = Vec::with_capacity(targets.len() + 1);
    for (descriptor, output) in targets.values().zip(outputs) {
        let encoded = render(Arc::clone(&source), descriptor, output).await?;
        write_atomic(&descriptor.path, &encoded).await?;

        info!(
            label = %descriptor.label,
            size = %descriptor.size,
            path = %descriptor.path.display(),
            "Variant written"
        );
        dispatches.push(Dispatch::now(LogJob::at(
            AuditLevel::Info,
            format!(
                "New resized image with dimension: {} - (wxh) At loc: {} has been generated from: {}",
                descriptor.size,
                descriptor.path.display(),
                original.path.display()
            ),
        )));
    }

    dispatches.push(Dispatch::now(CdnSyncJob::new(targets)));
    Ok(dispatches)
}

async fn load_image(path: &Path) -> Result<DynamicImage, JobError> {
    let unreadable = |reason: String| JobError::SourceImageUnreadable {
        path: path.display().to_string(),
        reason,
    };

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| unreadable(e.to_string()))?;

    tokio::task::spawn_blocking(move || image::load_from_memory(&data))
        .await
        .map_err(|e| JobError::Internal(format!("decode task failed: {e}")))?
        .map_err(|e| unreadable(e.to_string()))
}

/// Encoder for a target, chosen by its extension.
fn output_format(descriptor: &DerivedAssetDescriptor) -> Result<ImageOutputFormat, JobError> {
    let size = descriptor.size;
    if size.width == 0 || size.height == 0 {
        return Err(JobError::InvalidJob(format!(
            "variant '{}' has an empty target size {size}",
            descriptor.label
        )));
    }

    let unsupported = |reason: String| JobError::Encode {
        path: descriptor.path.display().to_string(),
        reason,
    };
    let format = ImageFormat::from_path(&descriptor.path).map_err(|e| unsupported(e.to_string()))?;
    match format {
        ImageFormat::Jpeg => Ok(ImageOutputFormat::Jpeg(JPEG_QUALITY)),
        other => match ImageOutputFormat::from(other) {
            ImageOutputFormat::Unsupported(name) => {
                Err(unsupported(format!("no encoder for {name}")))
            }
            output => Ok(output),
        },
    }
}

/// Resize to the exact target size and encode.
async fn render(
    source: Arc<DynamicImage>,
    descriptor: &DerivedAssetDescriptor,
    output: ImageOutputFormat,
) -> Result<Vec<u8>, JobError> {
    let size = descriptor.size;
    tokio::task::spawn_blocking(move || {
        let resized = source.resize_exact(size.width, size.height, FilterType::Triangle);
        // JPEG has no alpha channel.
        let resized = match output {
            ImageOutputFormat::Jpeg(_) => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };

        let mut buf = Vec::new();
        resized.write_to(&mut Cursor::new(&mut buf), output)?;
        Ok::<_, image::ImageError>(buf)
    })
    .await
    .map_err(|e| JobError::Internal(format!("encode task failed: {e}")))?
    .map_err(|e| JobError::Encode {
        path: descriptor.path.display().to_string(),
        reason: e.to_string(),
    })
}

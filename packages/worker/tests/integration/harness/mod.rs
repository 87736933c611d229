use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::audit::MemoryAuditSink;
use common::storage::{FilesystemObjectStore, MediaStore, ObjectStore};
use common::{RetryPolicy, SyncFailure, VariantSpec};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tempfile::TempDir;
use worker::{InlineRouter, Pipeline, UploadRequest};

pub const OWNER_ID: u64 = 7;

/// A media tree, a CDN mirror and an in-process pipeline over them.
pub struct TestEnv {
    pub media: MediaStore,
    pub mirror: PathBuf,
    pub audit: Arc<MemoryAuditSink>,
    pub pipeline: Arc<Pipeline>,
    pub router: InlineRouter,
    _root: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        let mirror = root.path().join("cdn");
        let store = FilesystemObjectStore::new(&mirror)
            .await
            .expect("Failed to create mirror");
        Self::build(root, mirror, Arc::new(store)).await
    }

    pub async fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        let mirror = root.path().join("cdn");
        Self::build(root, mirror, store).await
    }

    async fn build(root: TempDir, mirror: PathBuf, store: Arc<dyn ObjectStore>) -> Self {
        let media = MediaStore::new(root.path().join("media"))
            .await
            .expect("Failed to create media root");
        let audit = Arc::new(MemoryAuditSink::new());
        let pipeline = Arc::new(Pipeline::new(
            audit.clone(),
            store,
            RetryPolicy::new(3, Duration::ZERO),
        ));
        let router = InlineRouter::new(Arc::clone(&pipeline));

        Self {
            media,
            mirror,
            audit,
            pipeline,
            router,
            _root: root,
        }
    }

    pub fn audit_messages(&self) -> Vec<String> {
        self.audit.records().into_iter().map(|r| r.message).collect()
    }
}

pub fn variants() -> Vec<VariantSpec> {
    vec![
        VariantSpec::new("thumbnail", (20, 40), true),
        VariantSpec::new("small", (40, 30), true),
    ]
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(90))
        .expect("Failed to encode test image");
    buf
}

pub fn upload(filename: &str, bytes: Vec<u8>) -> UploadRequest {
    UploadRequest {
        bytes,
        owner_id: OWNER_ID,
        original_filename: filename.to_string(),
        received_at: Utc
            .with_ymd_and_hms(2024, 3, 5, 12, 30, 0)
            .single()
            .expect("valid timestamp"),
    }
}

/// Object store that counts calls and always answers the same way.
pub struct CountingStore {
    failure: Option<SyncFailure>,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn failing(failure: SyncFailure) -> Self {
        Self {
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    async fn put_object(&self, _key: &str, _data: Vec<u8>) -> Result<(), SyncFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

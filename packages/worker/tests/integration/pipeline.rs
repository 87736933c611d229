use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{AuditLevel, Dispatch, Job, LogJob, ORIGINAL_LABEL, Size, SyncFailure};
use mq::{MqError, QueueRouter};
use worker::{on_upload, submit};

use crate::harness::{CountingStore, TestEnv, jpeg, upload, variants};

/// Keeps dispatches instead of running them.
#[derive(Default)]
struct Recorder(Mutex<Vec<Dispatch>>);

impl Recorder {
    fn take(&self) -> Vec<Dispatch> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[async_trait]
impl QueueRouter for Recorder {
    async fn enqueue(&self, dispatch: Dispatch) -> Result<(), MqError> {
        self.0.lock().unwrap().push(dispatch);
        Ok(())
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn resize_emits_one_log_per_variant_and_one_sync() {
        let env = TestEnv::new().await;
        let asset = on_upload(upload("me.jpg", jpeg(80, 60)), &env.media)
            .await
            .unwrap();
        let recorder = Recorder::default();

        let descriptors = submit(&asset, &variants(), &recorder).await.unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[ORIGINAL_LABEL].size, Size::new(80, 60));

        let submitted = recorder.take();
        assert_eq!(submitted.len(), 1);
        let resize = submitted.into_iter().next().unwrap().job;
        assert!(matches!(resize, Job::Resize(_)));

        let emitted = env.pipeline.handle(resize).await.unwrap();

        let logs = emitted
            .iter()
            .filter(|d| matches!(d.job, Job::Log(_)))
            .count();
        let syncs = emitted
            .iter()
            .filter(|d| matches!(d.job, Job::CdnSync(_)))
            .count();
        assert_eq!(logs, 2);
        assert_eq!(syncs, 1);

        for label in ["thumbnail", "small"] {
            let d = &descriptors[label];
            let (w, h) = image::image_dimensions(&d.path).unwrap();
            assert_eq!(Size::new(w, h), d.size, "{label}");
        }
    }

    #[tokio::test]
    async fn inline_run_writes_variants_mirror_and_audit_log() {
        let env = TestEnv::new().await;
        let asset = on_upload(upload("me.jpg", jpeg(80, 60)), &env.media)
            .await
            .unwrap();

        let descriptors = submit(&asset, &variants(), &env.router).await.unwrap();

        for label in ["thumbnail", "small"] {
            let name = descriptors[label].path.file_name().unwrap();
            assert!(descriptors[label].path.is_file());
            assert!(env.mirror.join("2024/03/05").join(name).is_file());
        }
        assert!(!env.mirror.join("2024/03/05").join(&asset.name).exists());

        let messages = env.audit_messages();
        let resized = messages
            .iter()
            .filter(|m| m.starts_with("New resized image with dimension: "))
            .count();
        assert_eq!(resized, 2);
        assert!(messages.iter().any(|m| m.starts_with("Synced 2 images to filesystem")));
    }

    #[tokio::test]
    async fn repeated_resize_leaves_the_same_files() {
        let env = TestEnv::new().await;
        let asset = on_upload(upload("me.jpg", jpeg(80, 60)), &env.media)
            .await
            .unwrap();
        let recorder = Recorder::default();
        submit(&asset, &variants(), &recorder).await.unwrap();
        let resize = recorder.take().remove(0).job;

        env.pipeline.handle(resize.clone()).await.unwrap();
        let descriptors = match &resize {
            Job::Resize(job) => job.descriptors.clone(),
            _ => unreachable!(),
        };
        let first = std::fs::read(&descriptors["small"].path).unwrap();

        env.pipeline.handle(resize).await.unwrap();
        let second = std::fs::read(&descriptors["small"].path).unwrap();

        assert_eq!(first, second);
    }
}

mod cdn_failures {
    use super::*;

    #[tokio::test]
    async fn transient_failures_stop_after_max_retries() {
        let store = Arc::new(CountingStore::failing(SyncFailure::Transient(
            "connection refused".into(),
        )));
        let env = TestEnv::with_store(store.clone()).await;
        let asset = on_upload(upload("me.jpg", jpeg(80, 60)), &env.media)
            .await
            .unwrap();

        submit(&asset, &variants()[..1], &env.router).await.unwrap();

        assert_eq!(store.calls(), 4);
        let errors = env.audit.records_at(AuditLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("gave up after 4 attempts"));
        assert_eq!(env.audit.records_at(AuditLevel::Warning).len(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let store = Arc::new(CountingStore::failing(SyncFailure::Permanent(
            "access denied".into(),
        )));
        let env = TestEnv::with_store(store.clone()).await;
        let asset = on_upload(upload("me.jpg", jpeg(80, 60)), &env.media)
            .await
            .unwrap();

        submit(&asset, &variants()[..1], &env.router).await.unwrap();

        assert_eq!(store.calls(), 1);
        let errors = env.audit.records_at(AuditLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("non-retryable"));
    }
}

mod audit_log {
    use super::*;

    #[tokio::test]
    async fn unknown_level_is_recorded_as_warning() {
        let env = TestEnv::new().await;

        env.router
            .enqueue(Dispatch::now(LogJob::new("chatty", "hello there")))
            .await
            .unwrap();

        let warnings = env.audit.records_at(AuditLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].message,
            "Log level given 'chatty' is invalid: hello there"
        );
    }
}

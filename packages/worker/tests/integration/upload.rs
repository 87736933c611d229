use common::naming;
use worker::{UploadError, delete_asset, on_upload, submit};

use crate::harness::{OWNER_ID, TestEnv, jpeg, upload, variants};

#[tokio::test]
async fn encoded_name_round_trips() {
    let env = TestEnv::new().await;

    let asset = on_upload(upload("holiday.photo.jpg", jpeg(16, 16)), &env.media)
        .await
        .unwrap();

    let decoded = naming::decode(&asset.name).unwrap();
    assert_eq!(decoded.stem, "holiday.photo");
    assert_eq!(decoded.owner_id, OWNER_ID);
    assert_eq!(decoded.ext, "jpg");
    assert_eq!(decoded.name(), asset.name);
}

#[tokio::test]
async fn rejected_upload_leaves_no_files() {
    let env = TestEnv::new().await;

    let err = on_upload(upload("../me.jpg", jpeg(16, 16)), &env.media)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::InvalidFilename(_)));
    assert!(!env.media.root().join("images").exists());
}

#[tokio::test]
async fn delete_after_inline_run_removes_every_local_file() {
    let env = TestEnv::new().await;
    let asset = on_upload(upload("me.jpg", jpeg(80, 60)), &env.media)
        .await
        .unwrap();
    let descriptors = submit(&asset, &variants(), &env.router).await.unwrap();

    let removed = delete_asset(&asset, &variants()).await.unwrap();

    assert_eq!(removed, 3);
    assert!(descriptors.values().all(|d| !d.path.exists()));
}

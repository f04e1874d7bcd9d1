//! End-to-end import behaviour through the MediaVault facade.

mod common;

use common::{TestVault, LANDSCAPE, MB, PORTRAIT};
use futures::StreamExt;
use reelvault_core::validation::ValidationOutcome;
use reelvault_core::{AssetStatus, ErrorCode, UploadState, VaultError};
use std::sync::Arc;

#[tokio::test]
async fn test_portrait_clip_is_imported_uploaded_and_deduplicated() {
    let env = TestVault::new().await;
    let descriptor = env.clip("portrait.mp4", PORTRAIT, 50 * MB);

    let quick = env.vault.validation().quick_validate(&descriptor).await;
    assert_eq!(quick.outcome, ValidationOutcome::Pass);
    assert!(quick.measured_duration_ms < 100);

    let asset = env.vault.import(descriptor.clone()).await.unwrap();
    assert_eq!(asset.status, AssetStatus::Persisted);
    assert_eq!((asset.width, asset.height), (Some(720), Some(1280)));
    assert_eq!(asset.size_bytes, 50 * MB);
    assert!(asset.thumbnail_ref.as_ref().unwrap().exists());
    assert!(asset.cached_path.as_ref().unwrap().exists());

    let handle = env.vault.upload(&asset.id).unwrap();
    let progress: Vec<f64> = handle.progress_stream().collect().await;
    let task = handle.wait().await.unwrap();
    assert_eq!(task.state, UploadState::Completed);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));

    let uploaded = env.vault.asset(&asset.id).unwrap();
    assert_eq!(uploaded.status, AssetStatus::Uploaded);
    assert!(uploaded.remote_url.unwrap().starts_with("file://"));

    match env.vault.import(descriptor).await {
        Err(VaultError::DuplicateAsset { existing_id, .. }) => assert_eq!(existing_id, asset.id),
        other => panic!("expected DuplicateAsset, got {:?}", other),
    }
    assert_eq!(env.vault.assets().len(), 1);
}

#[tokio::test]
async fn test_landscape_clip_is_rejected_and_temp_copy_removed() {
    let env = TestVault::new().await;
    let descriptor = env.clip("landscape.mp4", LANDSCAPE, 50 * MB);

    let err = env.vault.import(descriptor).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AspectRatioRejected);
    assert!(err.is_recoverable());

    let assets = env.vault.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].status, AssetStatus::Rejected);
    assert_eq!(
        assets[0].last_error.as_ref().map(|e| e.code),
        Some(ErrorCode::AspectRatioRejected)
    );
    assert_eq!(assets[0].cached_path, None);

    let staging = env.vault.cache().staging_dir();
    assert_eq!(std::fs::read_dir(staging).unwrap().count(), 0);
    let stats = env.vault.cache_stats().await;
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_bytes, 0);
}

#[tokio::test]
async fn test_oversized_clip_fails_quick_validation_without_probe() {
    let env = TestVault::new().await;
    let descriptor = env.clip("huge.mp4", PORTRAIT, 150 * MB);

    let quick = env.vault.validation().quick_validate(&descriptor).await;
    assert_eq!(quick.outcome, ValidationOutcome::Fail);
    assert!(quick.measured_duration_ms < 100);

    let err = env.vault.import(descriptor).await.unwrap_err();
    assert!(matches!(err, VaultError::FileTooLarge { .. }));
    assert_eq!(env.probe_calls(), 0);
    assert_eq!(env.vault.assets()[0].status, AssetStatus::Rejected);
}

#[tokio::test]
async fn test_rejection_is_remembered_until_asset_is_deleted() {
    let env = TestVault::new().await;
    let descriptor = env.clip("wrong-mime.mp4", PORTRAIT, MB).with_mime_type("video/webm");

    let err = env.vault.import(descriptor.clone()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidFormat);
    let first_id = env.vault.assets()[0].id.clone();

    // Within the result TTL the same content is rejected from the cache,
    // even with a corrected type. The earlier record is kept.
    let fixed = descriptor.with_mime_type("video/mp4");
    let err = env.vault.import(fixed.clone()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidFormat);
    let assets = env.vault.assets();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].id, first_id);
    assert!(assets.iter().all(|a| a.status == AssetStatus::Rejected));

    env.vault.delete_asset(&assets[1].id).await.unwrap();
    let asset = env.vault.import(fixed).await.unwrap();
    assert_eq!(asset.status, AssetStatus::Persisted);
}

#[tokio::test]
async fn test_concurrent_imports_of_same_content_yield_one_asset() {
    let env = TestVault::new().await;
    let first = env.clip("same.mp4", PORTRAIT, 2 * MB);
    let batch = vec![first.clone(), first.clone(), first];

    let results = env.vault.import_batch(batch).await;

    let persisted = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(VaultError::DuplicateAsset { .. })))
        .count();
    assert_eq!(persisted, 1);
    assert_eq!(duplicates, 2);
    assert_eq!(env.vault.assets().len(), 1);
}

#[tokio::test]
async fn test_batch_mixes_outcomes_in_input_order() {
    let env = TestVault::new().await;
    let batch = vec![
        env.clip("a.mp4", PORTRAIT, MB),
        env.clip("b.mp4", "720x1280 vp9 45", MB),
        env.clip("c.mp4", "720x1280 h264 90", MB),
    ];

    let results = env.vault.import_batch(batch).await;

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(VaultError::CodecRejected { .. })));
    assert!(matches!(results[2], Err(VaultError::DurationExceeded { .. })));
}

#[tokio::test]
async fn test_assets_survive_reopen() {
    let env = TestVault::new().await;
    let asset = env
        .vault
        .import(env.clip("keep.mp4", PORTRAIT, MB))
        .await
        .unwrap();
    drop(env.vault);

    let probe = Arc::new(common::HeaderProbe::default());
    let reopened = TestVault::open(env.temp_dir.path(), probe, |b| b).await;

    let restored = reopened.asset(&asset.id).unwrap();
    assert_eq!(restored, asset);
    assert_eq!(reopened.cache_stats().await.entry_count, 2);
}

#[tokio::test]
async fn test_delete_asset_frees_cache() {
    let env = TestVault::new().await;
    let descriptor = env.clip("gone.mp4", PORTRAIT, MB);
    let asset = env.vault.import(descriptor.clone()).await.unwrap();

    env.vault.delete_asset(&asset.id).await.unwrap();

    assert!(env.vault.asset(&asset.id).is_none());
    assert_eq!(env.vault.cache_stats().await.entry_count, 0);
    assert!(!asset.cached_path.unwrap().exists());

    // Deleted content is no longer a duplicate.
    assert!(env.vault.import(descriptor).await.is_ok());
}

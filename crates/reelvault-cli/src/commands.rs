//! Command handlers.
//!
//! Each handler returns the JSON document to print: `{success: true, ...}` on
//! success, `{success: false, error: {code, message, suggestions}}` otherwise.

use crate::Command;
use futures::StreamExt;
use reelvault_core::{MediaDescriptor, MediaVault, UploadState, VaultError};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

pub async fn run(vault: &MediaVault, command: Command) -> Value {
    let result = match command {
        Command::Import { paths, mime_type } => Ok(import(vault, paths, mime_type).await),
        Command::Upload { asset_id } => upload(vault, &asset_id).await,
        Command::List => to_value("assets", &vault.assets()),
        Command::Show { asset_id } => match vault.asset(&asset_id) {
            Some(asset) => to_value("asset", &asset),
            None => Err(VaultError::not_found("asset", asset_id)),
        },
        Command::Delete { asset_id } => match vault.delete_asset(&asset_id).await {
            Ok(asset) => to_value("deleted", &asset),
            Err(e) => Err(e),
        },
        Command::Stats => to_value("stats", &vault.cache_stats().await),
        Command::Verify => match vault.verify_cache().await {
            Ok(report) => to_value("report", &report),
            Err(e) => Err(e),
        },
        Command::Evict => match vault.evict_cache().await {
            Ok(report) => to_value("report", &report),
            Err(e) => Err(e),
        },
        Command::Demo { path } => match vault.add_demo_asset(&path).await {
            Ok(entry) => to_value("entry", &entry),
            Err(e) => Err(e),
        },
    };

    result.unwrap_or_else(|e| json!({ "success": false, "error": error_value(&e) }))
}

fn to_value<T: Serialize>(key: &str, data: &T) -> Result<Value, VaultError> {
    let data = serde_json::to_value(data).map_err(|e| VaultError::Json {
        message: format!("Failed to serialize {}", key),
        source: Some(e),
    })?;
    Ok(json!({ "success": true, key: data }))
}

fn error_value(err: &VaultError) -> Value {
    json!({
        "code": err.code(),
        "message": err.to_string(),
        "recoverable": err.is_recoverable(),
        "suggestions": err.suggestions(),
    })
}

async fn import(vault: &MediaVault, paths: Vec<PathBuf>, mime_type: Option<String>) -> Value {
    let descriptors: Vec<MediaDescriptor> = paths
        .into_iter()
        .map(|path| {
            let descriptor = MediaDescriptor::from_path(path);
            match &mime_type {
                Some(mime) => descriptor.with_mime_type(mime.clone()),
                None => descriptor,
            }
        })
        .collect();
    let sources: Vec<String> = descriptors.iter().map(|d| d.source_uri()).collect();

    let results = vault.import_batch(descriptors).await;
    let all_ok = results.iter().all(|r| r.is_ok());
    let items: Vec<Value> = sources
        .into_iter()
        .zip(results)
        .map(|(source, result)| match result {
            Ok(asset) => json!({ "source": source, "asset": asset }),
            Err(e) => {
                warn!("Import of {} failed: {}", source, e);
                json!({ "source": source, "error": error_value(&e) })
            }
        })
        .collect();

    json!({ "success": all_ok, "imports": items })
}

async fn upload(vault: &MediaVault, asset_id: &str) -> Result<Value, VaultError> {
    let handle = vault.upload(asset_id)?;
    let task_id = handle.task_id().to_string();
    info!("Upload {} started", task_id);

    let mut progress = Box::pin(handle.progress_stream());
    let watch_progress = async {
        while let Some(fraction) = progress.next().await {
            info!("Upload progress: {:.0}%", fraction * 100.0);
        }
    };
    tokio::select! {
        _ = watch_progress => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling upload {}", task_id);
            vault.cancel_upload(&task_id)?;
        }
    }

    let task = handle.wait().await?;
    let success = task.state == UploadState::Completed;
    let mut output = to_value("task", &task)?;
    output["success"] = json!(success);
    if let Some(failure) = &task.error {
        output["error"] = json!(failure);
    }
    Ok(output)
}

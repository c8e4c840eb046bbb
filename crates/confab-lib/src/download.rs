//! Synthesis asset downloader with progress reporting via callback.
//!
//! Downloads resume: a `.partial` file is kept next to the destination and
//! picked up with an HTTP Range request on the next attempt.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use confab_core::types::{DownloadProgress, ModelAsset, SYNTH_MODEL, SYNTH_VOICES};

/// Whether an asset already exists under the assets directory.
pub fn asset_exists(assets_dir: &Path, asset: &ModelAsset) -> bool {
    assets_dir.join(asset.filename).is_file()
}

/// Path an asset lives at under the assets directory.
pub fn asset_path(assets_dir: &Path, asset: &ModelAsset) -> PathBuf {
    assets_dir.join(asset.filename)
}

/// Download one asset, reporting progress as bytes arrive.
pub async fn download_asset(
    assets_dir: &Path,
    asset: &ModelAsset,
    on_progress: impl Fn(DownloadProgress),
) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(assets_dir)
        .await
        .map_err(|e| format!("failed to create assets dir: {e}"))?;

    let dest = assets_dir.join(asset.filename);
    if dest.is_file() {
        on_progress(progress(asset, asset.expected_size, asset.expected_size, "complete"));
        return Ok(dest);
    }

    let partial = assets_dir.join(format!("{}.partial", asset.filename));
    let resume_from = match tokio::fs::metadata(&partial).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    let client = reqwest::Client::new();
    let mut request = client.get(asset.url);
    if resume_from > 0 {
        request = request.header("Range", format!("bytes={resume_from}-"));
    }

    let resp = request
        .send()
        .await
        .map_err(|e| format!("download request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() && status != reqwest::StatusCode::PARTIAL_CONTENT {
        return Err(format!("download failed with status {status}"));
    }

    let total = if status == reqwest::StatusCode::PARTIAL_CONTENT {
        // Total size is the tail of the Content-Range header
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.rsplit('/').next())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(asset.expected_size)
    } else {
        resp.content_length().unwrap_or(asset.expected_size)
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&partial)
        .await
        .map_err(|e| format!("failed to open partial file: {e}"))?;

    let mut done = resume_from;
    let mut stream = resp.bytes_stream();

    use futures_util::StreamExt;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("download stream error: {e}"))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("failed to write chunk: {e}"))?;
        done += chunk.len() as u64;
        on_progress(progress(asset, done, total, "downloading"));
    }

    file.flush()
        .await
        .map_err(|e| format!("flush failed: {e}"))?;
    drop(file);

    tokio::fs::rename(&partial, &dest)
        .await
        .map_err(|e| format!("failed to finalize download: {e}"))?;

    on_progress(progress(asset, total, total, "complete"));
    Ok(dest)
}

/// Ensure the synthesis model and voice pack are both present.
/// Returns (model path, voices path).
pub async fn ensure_assets(
    assets_dir: &Path,
    on_progress: impl Fn(DownloadProgress),
) -> Result<(PathBuf, PathBuf), String> {
    let model = download_asset(assets_dir, &SYNTH_MODEL, &on_progress).await?;
    let voices = download_asset(assets_dir, &SYNTH_VOICES, &on_progress).await?;
    Ok((model, voices))
}

fn progress(asset: &ModelAsset, done: u64, total: u64, status: &str) -> DownloadProgress {
    DownloadProgress {
        asset: asset.name.to_string(),
        percent: if total == 0 {
            100.0
        } else {
            (done as f32 / total as f32 * 100.0).min(100.0)
        },
        bytes_done: done,
        bytes_total: total,
        status: status.to_string(),
    }
}

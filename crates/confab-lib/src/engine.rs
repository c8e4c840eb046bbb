//! Local synthesis engine lifecycle — spawn and monitor the sidecar server.
//!
//! The engine is an external process serving the synthesis HTTP API on
//! localhost. The manager downloads its model assets, spawns the binary,
//! drains its stderr into tracing, health-checks the port, and kills the
//! process on stop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::Mutex;

use confab_core::types::{DownloadProgress, SYNTH_MODEL, SYNTH_VOICES};

use crate::download;

const ENGINE_SIDECAR: &str = "koko";
const ENGINE_PORT: u16 = 3001;

/// Observable engine state.
#[derive(Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub assets_downloaded: bool,
    pub running: bool,
    pub port: u16,
}

struct RunningEngine {
    child: Child,
}

#[derive(Default)]
pub struct SynthEngineManager {
    engine: Arc<Mutex<Option<RunningEngine>>>,
}

impl SynthEngineManager {
    pub async fn status(&self, assets_dir: &Path) -> EngineStatus {
        EngineStatus {
            assets_downloaded: download::asset_exists(assets_dir, &SYNTH_MODEL)
                && download::asset_exists(assets_dir, &SYNTH_VOICES),
            running: self.is_running().await,
            port: ENGINE_PORT,
        }
    }

    /// Download assets if needed, spawn the sidecar, and wait until it
    /// answers on its port.
    pub async fn start(
        &self,
        assets_dir: &Path,
        on_progress: impl Fn(DownloadProgress),
    ) -> Result<(), String> {
        let (model, voices) = download::ensure_assets(assets_dir, on_progress).await?;

        if !self.is_running().await {
            self.spawn_engine(&model, &voices).await?;
        }

        self.wait_for_health(60).await
    }

    /// Whether the engine port already answers (ours or an external one).
    pub async fn is_reachable(&self) -> bool {
        reqwest::Client::new()
            .get(format!("http://127.0.0.1:{ENGINE_PORT}/"))
            .timeout(std::time::Duration::from_secs(1))
            .send()
            .await
            .is_ok()
    }

    pub async fn stop(&self) {
        let mut guard = self.engine.lock().await;
        if let Some(mut engine) = guard.take() {
            let _ = engine.child.kill().await;
        }
    }

    /// Best-effort kill for shutdown paths without an executor.
    pub fn stop_sync(&self) {
        if let Ok(mut guard) = self.engine.try_lock() {
            if let Some(mut engine) = guard.take() {
                let _ = engine.child.start_kill();
            }
        }
    }

    async fn spawn_engine(&self, model: &Path, voices: &Path) -> Result<(), String> {
        let binary = resolve_sidecar(ENGINE_SIDECAR);

        let mut child = tokio::process::Command::new(&binary)
            .args([
                "--model",
                &model.to_string_lossy(),
                "--data",
                &voices.to_string_lossy(),
                "openai",
                "--ip",
                "127.0.0.1",
                "--port",
                &ENGINE_PORT.to_string(),
            ])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn {ENGINE_SIDECAR}: {e}"))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                use tokio::io::{AsyncBufReadExt, BufReader};
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("[engine] {line}");
                }
            });
        }

        let mut guard = self.engine.lock().await;
        *guard = Some(RunningEngine { child });
        Ok(())
    }

    async fn is_running(&self) -> bool {
        let mut guard = self.engine.lock().await;
        if let Some(ref mut engine) = *guard {
            match engine.child.try_wait() {
                Ok(None) => true,
                // Exited or unknown — forget the handle either way
                _ => {
                    *guard = None;
                    false
                }
            }
        } else {
            false
        }
    }

    async fn wait_for_health(&self, timeout_secs: u64) -> Result<(), String> {
        let url = format!("http://127.0.0.1:{ENGINE_PORT}/");
        let client = reqwest::Client::new();
        let deadline =
            tokio::time::Instant::now() + tokio::time::Duration::from_secs(timeout_secs);

        loop {
            if tokio::time::Instant::now() > deadline {
                return Err(format!(
                    "synthesis engine did not become ready within {timeout_secs}s"
                ));
            }
            match client.get(&url).send().await {
                Ok(_) => return Ok(()),
                Err(_) => {
                    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
                }
            }
        }
    }
}

/// Look for the sidecar binary next to the executable, then fall back to
/// PATH resolution.
fn resolve_sidecar(name: &str) -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let local = dir.join(name);
            if local.is_file() {
                return local;
            }
            let local_exe = dir.join(format!("{name}.exe"));
            if local_exe.is_file() {
                return local_exe;
            }
        }
    }
    PathBuf::from(name)
}

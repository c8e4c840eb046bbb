//! Voice output — synthesize reply text to WAV bytes via the local engine.
//!
//! The reply is cleaned for speech, posted to the local synthesis engine,
//! and the streamed response body is spooled through a scoped temporary
//! file before being read back as one WAV buffer. The spool file is removed
//! on every exit path, including synthesis failure. Synthesis failures
//! themselves propagate to the caller unhandled.

use std::io::Write;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use confab_core::speech_text::{clean_spoken_text, is_speakable};
use confab_core::types::SynthConfig;
use confab_core::wav::fix_wav_sizes;

use crate::session::VoiceOutput;

/// Local synthesis engine client.
pub struct Synthesizer {
    config: SynthConfig,
    http: reqwest::Client,
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Quick reachability probe for the local engine.
    pub async fn engine_reachable(&self) -> bool {
        self.http
            .get(format!("{}/", self.config.engine_url))
            .timeout(std::time::Duration::from_secs(1))
            .send()
            .await
            .is_ok()
    }
}

#[async_trait]
impl VoiceOutput for Synthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, String> {
        let spoken = clean_spoken_text(text);
        if !is_speakable(&spoken) {
            return Err("nothing speakable in message".to_string());
        }

        let body = serde_json::json!({
            "model": "kokoro",
            "input": spoken,
            "voice": self.config.voice,
            "response_format": "wav",
            "speed": self.config.speed,
        });

        let resp = self
            .http
            .post(format!("{}/v1/audio/speech", self.config.engine_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("synthesis request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("synthesis failed ({status}): {body}"));
        }

        // Spool the streamed body through a scoped temp file; the file is
        // deleted when `spool` drops, success or not.
        let mut spool = tempfile::NamedTempFile::new()
            .map_err(|e| format!("failed to create audio spool: {e}"))?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("synthesis stream error: {e}"))?;
            spool
                .write_all(&chunk)
                .map_err(|e| format!("spool write error: {e}"))?;
        }
        spool
            .flush()
            .map_err(|e| format!("spool flush error: {e}"))?;

        let wav = std::fs::read(spool.path())
            .map_err(|e| format!("spool read error: {e}"))?;
        debug!("synthesized {} bytes of audio", wav.len());

        // Streaming engines leave sentinel chunk sizes in the header
        Ok(fix_wav_sizes(wav))
    }
}

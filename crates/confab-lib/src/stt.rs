//! Voice input — capture one utterance, send it to the remote recognizer.
//!
//! Capture uses an energy-based voice activity gate: recording starts on
//! the first chunk above the silence threshold and ends after a stretch of
//! trailing silence, a hard cap, or a no-speech timeout. The captured audio
//! goes to the remote transcription endpoint as a WAV upload.
//!
//! Failures follow the two-condition contract: audio the service cannot
//! make sense of yields [`RecognizeError::Unrecognized`], a broken or
//! unreachable service yields [`RecognizeError::Request`]. No retry either
//! way, and neither condition touches the transcript.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use confab_core::types::{RecognizeError, RecognizerConfig};
use confab_core::wav::{compute_rms, write_wav, SAMPLE_RATE};

use crate::capture::AudioCapture;
use crate::session::VoiceInput;

// Voice activity tuning
const SILENCE_THRESHOLD: f32 = 0.004;
const MIN_SPEECH_MS: u64 = 180;
const TRAILING_SILENCE_MS: u64 = 700;
const MAX_CAPTURE_MS: u64 = 12_000;
const NO_SPEECH_TIMEOUT_MS: u64 = 7_000;

/// Per-chunk read timeout; a stalled device should not hang the session.
const READ_TIMEOUT_MS: u64 = 500;

/// Microphone + remote recognizer voice input adapter.
pub struct VoiceListener {
    config: RecognizerConfig,
    http: reqwest::Client,
}

impl VoiceListener {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Upload WAV bytes to the transcription endpoint.
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, RecognizeError> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognizeError::Request(format!("mime error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "json");

        let mut request = self.http.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| RecognizeError::Request(format!("transcription request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecognizeError::Request(format!(
                "transcription failed ({status}): {body}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| RecognizeError::Request(format!("response read error: {e}")))?;
        parse_transcription(&body)
    }
}

#[async_trait]
impl VoiceInput for VoiceListener {
    async fn listen(&self) -> Result<String, RecognizeError> {
        let samples = capture_utterance()
            .await
            .map_err(RecognizeError::Request)?;
        if samples.is_empty() {
            return Err(RecognizeError::Unrecognized);
        }

        debug!(
            "captured {} ms of audio, transcribing",
            samples.len() as u64 * 1000 / SAMPLE_RATE as u64
        );
        self.transcribe(write_wav(&samples, SAMPLE_RATE)).await
    }
}

/// Extract recognized text from a transcription response body.
///
/// An empty or blank-audio transcript counts as unrecognized; a body that
/// is not the expected JSON counts as a service failure.
fn parse_transcription(body: &str) -> Result<String, RecognizeError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RecognizeError::Request(format!("invalid JSON: {e}; raw={body}")))?;

    let text = value
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .replace("[BLANK_AUDIO]", "")
        .trim()
        .to_string();

    if text.is_empty() {
        Err(RecognizeError::Unrecognized)
    } else {
        Ok(text)
    }
}

/// Block until one utterance has been captured, or return an empty buffer
/// when no speech arrived inside the timeout. The capture device is scoped
/// to this call and released on every exit path.
async fn capture_utterance() -> Result<Vec<i16>, String> {
    let mut capture = AudioCapture::new()?;
    let mut utterance: Vec<i16> = Vec::new();

    let started = Instant::now();
    let mut speech_at: Option<Instant> = None;
    let mut silence_at: Option<Instant> = None;

    loop {
        let chunk = match tokio::time::timeout(
            std::time::Duration::from_millis(READ_TIMEOUT_MS),
            capture.read_chunk(),
        )
        .await
        {
            Ok(Ok(chunk)) => chunk,
            Ok(Err(e)) => {
                if utterance.is_empty() {
                    return Err(format!("audio capture error: {e}"));
                }
                break;
            }
            Err(_) => return Err("audio capture read timeout".to_string()),
        };

        let level = compute_rms(&chunk);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if level > SILENCE_THRESHOLD {
            silence_at = None;
            if speech_at.is_none() {
                speech_at = Some(Instant::now());
            }
            utterance.extend_from_slice(&chunk);
        } else if let Some(at) = speech_at {
            utterance.extend_from_slice(&chunk);

            // Only end on silence once enough speech has accumulated
            if at.elapsed().as_millis() as u64 >= MIN_SPEECH_MS {
                let quiet_since = *silence_at.get_or_insert_with(Instant::now);
                if quiet_since.elapsed().as_millis() as u64 >= TRAILING_SILENCE_MS {
                    break;
                }
            }
        }

        if speech_at.is_none() && elapsed_ms >= NO_SPEECH_TIMEOUT_MS {
            return Ok(Vec::new());
        }
        if speech_at.is_some() && elapsed_ms >= MAX_CAPTURE_MS {
            break;
        }
    }

    Ok(utterance)
}

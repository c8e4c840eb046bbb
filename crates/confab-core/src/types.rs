//! Shared types for the confab chat engine.
//!
//! These types are used across confab-lib, confab-cli, and any downstream
//! shell. Keeping them here means consumers can depend on types without
//! pulling in tokio, reqwest, or the audio stack.

use serde::{Deserialize, Serialize};

// ─── Chat types ────────────────────────────────────────────────────────────

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One chat turn. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The fixed assistant greeting every fresh or reset transcript starts with.
pub const GREETING: &str = "How may I assist you today?";

// ─── Model catalogue ───────────────────────────────────────────────────────

/// The two hosted Llama 2 chat models confab can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatModel {
    Llama2_7b,
    Llama2_13b,
}

impl ChatModel {
    /// Full Replicate version identifier for the prediction request.
    pub fn version(&self) -> &'static str {
        match self {
            ChatModel::Llama2_7b => {
                "a16z-infra/llama7b-v2-chat:4f0a4744c7295c024a1de15e1a63c880d3da035fa1f49bfd344fe076074c8eea"
            }
            ChatModel::Llama2_13b => {
                "a16z-infra/llama13b-v2-chat:df7690f1994d94e96ad9d568eac121aecf50684a0b0963b25a41cc40061269e5"
            }
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ChatModel::Llama2_7b => "Llama2-7B",
            ChatModel::Llama2_13b => "Llama2-13B",
        }
    }

    /// Parse a label or shorthand ("7b" / "13b").
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "llama2-7b" | "7b" => Ok(ChatModel::Llama2_7b),
            "llama2-13b" | "13b" => Ok(ChatModel::Llama2_13b),
            other => Err(format!("unknown model '{other}'; expected 7b or 13b")),
        }
    }
}

/// Sampling parameters sent with every inference request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_length: u32,
    pub repetition_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            max_length: 120,
            repetition_penalty: 1.0,
        }
    }
}

impl GenerationParams {
    /// Normalize to the ranges the UI sliders allow: temperature 0.01–5.0,
    /// top_p 0.01–1.0, max_length 32–128 snapped to a multiple of 8.
    /// repetition_penalty is pinned at 1.0.
    pub fn clamped(&self) -> Self {
        let max_length = self.max_length.clamp(32, 128);
        Self {
            temperature: self.temperature.clamp(0.01, 5.0),
            top_p: self.top_p.clamp(0.01, 1.0),
            max_length: max_length - (max_length - 32) % 8,
            repetition_penalty: 1.0,
        }
    }
}

// ─── Voice input types ─────────────────────────────────────────────────────

/// Why a voice-input attempt produced no text.
///
/// Both conditions are caught locally and surfaced to the user; neither
/// touches the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizeError {
    /// The recognizer could not make sense of the captured audio.
    Unrecognized,
    /// The recognition service was unreachable or returned a failure.
    Request(String),
}

impl std::fmt::Display for RecognizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognizeError::Unrecognized => {
                f.write_str("Sorry, I did not understand that.")
            }
            RecognizeError::Request(e) => write!(
                f,
                "Sorry, there was a problem with the speech recognition service: {e}"
            ),
        }
    }
}

/// Remote speech-recognition endpoint configuration.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Transcription endpoint (OpenAI-compatible `/v1/audio/transcriptions`).
    pub endpoint: String,
    /// Recognition model name sent with the upload.
    pub model: String,
    /// Spoken language hint.
    pub language: String,
    /// Optional bearer key for hosted services.
    pub api_key: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/transcriptions".into(),
            model: "whisper-1".into(),
            language: "en".into(),
            api_key: None,
        }
    }
}

// ─── Voice output types ────────────────────────────────────────────────────

/// Local speech-synthesis engine configuration.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub engine_url: String,
    pub voice: String,
    pub speed: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://localhost:3001".into(),
            voice: "af_heart".into(),
            speed: 1.0,
        }
    }
}

// ─── Synthesis engine assets ───────────────────────────────────────────────

/// One downloadable file the local synthesis engine needs.
pub struct ModelAsset {
    pub name: &'static str,
    pub filename: &'static str,
    pub url: &'static str,
    pub expected_size: u64,
}

pub const SYNTH_MODEL: ModelAsset = ModelAsset {
    name: "synth",
    filename: "kokoro-v1.0.onnx",
    url: "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/kokoro-v1.0.onnx",
    expected_size: 326_000_000,
};

pub const SYNTH_VOICES: ModelAsset = ModelAsset {
    name: "synth-voices",
    filename: "voices-v1.0.bin",
    url: "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/voices-v1.0.bin",
    expected_size: 5_200_000,
};

/// Download progress payload.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub asset: String,
    pub percent: f32,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub status: String, // "downloading" | "complete"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_matches_prompt_prefixes() {
        assert_eq!(Role::User.to_string(), "User");
        assert_eq!(Role::Assistant.to_string(), "Assistant");
    }

    #[test]
    fn model_parse_shorthands() {
        assert_eq!(ChatModel::parse("7b").unwrap(), ChatModel::Llama2_7b);
        assert_eq!(ChatModel::parse("Llama2-13B").unwrap(), ChatModel::Llama2_13b);
        assert!(ChatModel::parse("70b").is_err());
    }

    #[test]
    fn model_versions_are_distinct() {
        assert_ne!(
            ChatModel::Llama2_7b.version(),
            ChatModel::Llama2_13b.version()
        );
    }

    #[test]
    fn params_default_within_range() {
        let p = GenerationParams::default();
        assert_eq!(p.clamped(), p);
    }

    #[test]
    fn params_clamp_out_of_range() {
        let p = GenerationParams {
            temperature: 9.0,
            top_p: 0.0,
            max_length: 1000,
            repetition_penalty: 3.0,
        }
        .clamped();
        assert_eq!(p.temperature, 5.0);
        assert_eq!(p.top_p, 0.01);
        assert_eq!(p.max_length, 128);
        assert_eq!(p.repetition_penalty, 1.0);
    }

    #[test]
    fn params_snap_max_length_to_step() {
        let p = GenerationParams {
            max_length: 100,
            ..Default::default()
        }
        .clamped();
        // 100 snaps down to the 32 + 8k grid
        assert_eq!(p.max_length, 96);

        let p = GenerationParams {
            max_length: 33,
            ..Default::default()
        }
        .clamped();
        assert_eq!(p.max_length, 32);
    }

    #[test]
    fn recognize_error_display() {
        assert!(RecognizeError::Unrecognized.to_string().contains("did not understand"));
        assert!(RecognizeError::Request("timeout".into())
            .to_string()
            .contains("speech recognition service"));
    }
}

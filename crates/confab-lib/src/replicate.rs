//! Inference client for the hosted model API.
//!
//! A reply is produced in two steps: create a prediction, then consume its
//! SSE stream, forwarding each `output` event as one text fragment. The
//! fragments flow through an mpsc channel into a [`ReplyStream`] handle, so
//! the caller gets explicit next-fragment-or-done semantics and dropping the
//! handle cancels the producing task.
//!
//! There is no retry, backoff, or partial-result recovery: any transport or
//! service failure surfaces as a single `Err` fragment and ends the stream.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use confab_core::types::GenerationParams;

use crate::session::ReplyGenerator;
use crate::sse::SseParser;

/// Hosted inference API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// Channel capacity between the fetch task and the consumer. Small on
/// purpose: an abandoned consumer back-pressures the task into noticing
/// the closed channel quickly.
const FRAGMENT_QUEUE: usize = 32;

// ─── Reply stream ──────────────────────────────────────────────────────────

/// A finite, non-restartable stream of reply fragments.
///
/// Dropping the stream closes the channel, which cancels the producing
/// request task at its next send.
pub struct ReplyStream {
    rx: mpsc::Receiver<Result<String, String>>,
}

impl ReplyStream {
    /// Create a stream plus the sender half that feeds it.
    pub fn channel() -> (mpsc::Sender<Result<String, String>>, Self) {
        let (tx, rx) = mpsc::channel(FRAGMENT_QUEUE);
        (tx, Self { rx })
    }

    /// A pre-loaded stream for tests and scripted shells.
    pub fn scripted(fragments: Vec<Result<String, String>>) -> Self {
        let (tx, rx) = mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            // Capacity covers every fragment, so try_send cannot fail here
            let _ = tx.try_send(fragment);
        }
        Self { rx }
    }

    /// Next fragment, or `None` once the reply is complete.
    pub async fn next_fragment(&mut self) -> Option<Result<String, String>> {
        self.rx.recv().await
    }
}

// ─── Wire types ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
    stream: bool,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    max_length: u32,
    repetition_penalty: f32,
}

#[derive(Deserialize)]
struct Prediction {
    id: String,
    urls: PredictionUrls,
}

#[derive(Deserialize)]
struct PredictionUrls {
    stream: Option<String>,
}

// ─── Client ────────────────────────────────────────────────────────────────

/// Client for the hosted inference service.
pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ReplicateClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Point the client at a different API base (local test servers).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

impl ReplyGenerator for ReplicateClient {
    fn generate(&self, model_version: &str, prompt: &str, params: &GenerationParams) -> ReplyStream {
        let (tx, stream) = ReplyStream::channel();
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let token = self.token.clone();
        let version = model_version.to_string();
        let prompt = prompt.to_string();
        let params = *params;

        tokio::spawn(async move {
            if let Err(e) = run_prediction(&http, &base_url, &token, &version, &prompt, &params, &tx).await {
                // Consumer may already be gone; nothing to do then
                let _ = tx.send(Err(e)).await;
            }
        });

        stream
    }
}

/// Create the prediction and pump its SSE stream into `tx` until done.
async fn run_prediction(
    http: &reqwest::Client,
    base_url: &str,
    token: &str,
    version: &str,
    prompt: &str,
    params: &GenerationParams,
    tx: &mpsc::Sender<Result<String, String>>,
) -> Result<(), String> {
    let request = PredictionRequest {
        version,
        input: PredictionInput {
            prompt,
            temperature: params.temperature,
            top_p: params.top_p,
            max_length: params.max_length,
            repetition_penalty: params.repetition_penalty,
        },
        stream: true,
    };

    let resp = http
        .post(format!("{base_url}/predictions"))
        .header("Authorization", format!("Token {token}"))
        .json(&request)
        .send()
        .await
        .map_err(|e| format!("prediction request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(format!("prediction create failed ({status}): {body}"));
    }

    let prediction: Prediction = resp
        .json()
        .await
        .map_err(|e| format!("invalid prediction response: {e}"))?;
    let stream_url = prediction
        .urls
        .stream
        .ok_or_else(|| format!("prediction {} has no stream URL", prediction.id))?;

    debug!("prediction {}: opening stream", prediction.id);

    let resp = http
        .get(&stream_url)
        .header("Accept", "text/event-stream")
        .header("Cache-Control", "no-store")
        .send()
        .await
        .map_err(|e| format!("stream request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("stream request failed ({status})"));
    }

    let mut parser = SseParser::new();
    let mut body = resp.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| format!("stream read error: {e}"))?;
        for event in parser.push(&chunk) {
            match event.event.as_deref() {
                Some("output") => {
                    if tx.send(Ok(event.data)).await.is_err() {
                        // Consumer dropped the ReplyStream — cancelled
                        debug!("prediction {}: consumer gone, stopping", prediction.id);
                        return Ok(());
                    }
                }
                Some("error") => return Err(format!("inference failed: {}", event.data)),
                Some("done") => return Ok(()),
                _ => {}
            }
        }
    }

    Ok(())
}

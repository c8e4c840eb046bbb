//! HTTP API for an external shell (browser tab, desktop app).
//!
//! The session sits behind an async mutex, so shell requests run strictly
//! one at a time — the same serial, single-actor discipline an event loop
//! gives a local shell. Streaming endpoints answer with Server-Sent Events
//! carrying the session's event feed. CORS is permissive so a browser shell
//! can call from another origin.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::debug;

use confab_core::types::Message;

use crate::session::{ChatSession, Command, SessionEvent};

/// The one session this server fronts.
pub type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

/// Build the axum router over a shared [`ChatSession`].
pub fn router(session: SharedSession) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/voice/listen", post(voice_listen))
        .route("/clear", post(clear))
        .route("/speak", post(speak))
        .route("/history", get(history))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .with_state(session)
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    text: String,
}

#[derive(serde::Deserialize)]
struct SpeakRequest {
    index: usize,
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(serde::Serialize)]
struct StatusResponse {
    recording: bool,
    listening: bool,
    messages: usize,
    model: String,
}

async fn chat(
    State(session): State<SharedSession>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    dispatch_sse(session, Command::Submit(req.text))
}

async fn voice_listen(
    State(session): State<SharedSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    dispatch_sse(session, Command::StartRecording)
}

async fn clear(State(session): State<SharedSession>) -> Json<OkResponse> {
    let mut session = session.lock().await;
    // ClearHistory cannot fail and emits nothing
    let _ = session.dispatch(Command::ClearHistory, |_| {}).await;
    Json(OkResponse { ok: true })
}

async fn history(State(session): State<SharedSession>) -> Json<Vec<Message>> {
    Json(session.lock().await.messages().to_vec())
}

async fn status(State(session): State<SharedSession>) -> Json<StatusResponse> {
    let session = session.lock().await;
    Json(StatusResponse {
        recording: session.is_recording(),
        listening: session.is_listening(),
        messages: session.messages().len(),
        model: session.config().model.label().to_string(),
    })
}

async fn speak(State(session): State<SharedSession>, Json(req): Json<SpeakRequest>) -> Response {
    let mut audio: Option<Vec<u8>> = None;
    let result = session
        .lock()
        .await
        .dispatch(Command::Listen(req.index), |event| {
            if let SessionEvent::Audio(wav) = event {
                audio = Some(wav);
            }
        })
        .await;

    match (result, audio) {
        (Ok(()), Some(wav)) => ([(header::CONTENT_TYPE, "audio/wav")], wav).into_response(),
        (Ok(()), None) => (StatusCode::INTERNAL_SERVER_ERROR, "no audio produced").into_response(),
        (Err(e), _) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Run a command against the session, forwarding its events as SSE.
fn dispatch_sse(
    session: SharedSession,
    command: Command,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let mut session = session.lock().await;
        let result = session
            .dispatch(command, |event| {
                if let Some(event) = to_sse_event(event) {
                    let _ = tx.send(event);
                }
            })
            .await;
        if let Err(e) = result {
            let _ = tx.send(Event::default().event("error").data(e));
        }
    });

    Sse::new(UnboundedReceiverStream::new(rx).map(Ok))
}

fn to_sse_event(event: SessionEvent) -> Option<Event> {
    match event {
        SessionEvent::Fragment { text } => Some(Event::default().event("fragment").data(text)),
        SessionEvent::Reply(message) => Some(
            Event::default()
                .event("reply")
                .data(serde_json::to_string(&message).unwrap_or_default()),
        ),
        SessionEvent::Voice(message) => Some(
            Event::default()
                .event("voice")
                .data(serde_json::to_string(&message).unwrap_or_default()),
        ),
        SessionEvent::Notice(notice) => Some(Event::default().event("notice").data(notice)),
        SessionEvent::Audio(wav) => {
            // Audio only flows through the /speak endpoint
            debug!("dropping {}-byte audio event on SSE channel", wav.len());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicate::ReplyStream;
    use crate::session::{ReplyGenerator, SessionConfig, VoiceInput, VoiceOutput};
    use async_trait::async_trait;
    use confab_core::types::{GenerationParams, RecognizeError};

    struct NoGenerator;
    impl ReplyGenerator for NoGenerator {
        fn generate(&self, _: &str, _: &str, _: &GenerationParams) -> ReplyStream {
            ReplyStream::scripted(vec![])
        }
    }

    struct NoVoice;
    #[async_trait]
    impl VoiceInput for NoVoice {
        async fn listen(&self) -> Result<String, RecognizeError> {
            Err(RecognizeError::Unrecognized)
        }
    }

    struct NoSynth;
    #[async_trait]
    impl VoiceOutput for NoSynth {
        async fn synthesize(&self, _: &str) -> Result<Vec<u8>, String> {
            Err("no synth in tests".into())
        }
    }

    #[tokio::test]
    async fn router_builds_over_shared_session() {
        let session = Arc::new(tokio::sync::Mutex::new(ChatSession::new(
            SessionConfig::default(),
            Box::new(NoGenerator),
            Box::new(NoVoice),
            Box::new(NoSynth),
        )));
        let _router = router(session.clone());
        assert_eq!(session.lock().await.messages().len(), 1);
    }
}

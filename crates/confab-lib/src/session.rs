//! Chat session — transcript state, recording flags, and command dispatch.
//!
//! The session is an explicit context object owned by whatever shell drives
//! it (CLI REPL, HTTP server). Shell actions arrive as [`Command`] values
//! and go through one `match` in [`ChatSession::dispatch`]; observable
//! results come back through a [`SessionEvent`] callback. Each dispatch runs
//! to completion before the next — the session is a single logical actor.
//!
//! The three external adapters (reply generator, voice input, voice output)
//! sit behind object-safe traits so shells and tests can swap them.

use async_trait::async_trait;

use confab_core::credential;
use confab_core::prompt::build_prompt;
use confab_core::transcript::Transcript;
use confab_core::types::{ChatModel, GenerationParams, Message, RecognizeError, Role};

use crate::replicate::ReplyStream;

// ─── Adapter seams ─────────────────────────────────────────────────────────

/// Produces a streamed reply for a prompt. The call itself does not block;
/// work happens behind the returned [`ReplyStream`].
pub trait ReplyGenerator: Send + Sync {
    fn generate(&self, model_version: &str, prompt: &str, params: &GenerationParams)
        -> ReplyStream;
}

/// Captures one utterance from the microphone and recognizes it.
#[async_trait]
pub trait VoiceInput: Send + Sync {
    async fn listen(&self) -> Result<String, RecognizeError>;
}

/// Synthesizes text to WAV bytes.
#[async_trait]
pub trait VoiceOutput: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, String>;
}

// ─── Session types ─────────────────────────────────────────────────────────

/// Per-session configuration, set by the shell before dispatching.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inference API credential; format-checked before any submission.
    pub credential: String,
    pub model: ChatModel,
    pub params: GenerationParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential: String::new(),
            model: ChatModel::Llama2_7b,
            params: GenerationParams::default(),
        }
    }
}

/// Shell actions, dispatched through a single handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit typed user text.
    Submit(String),
    /// Reset the transcript to the greeting.
    ClearHistory,
    /// Capture a voice utterance and treat it as a user turn.
    StartRecording,
    /// Clear the recording flags.
    StopRecording,
    /// Speak the assistant message at a transcript index.
    Listen(usize),
}

/// Observable results of a dispatch, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The accumulated reply text so far; one per received fragment.
    Fragment { text: String },
    /// The completed assistant reply, already appended to the transcript.
    Reply(Message),
    /// A voice-captured user turn, already appended to the transcript.
    Voice(Message),
    /// Synthesized WAV bytes for a Listen command.
    Audio(Vec<u8>),
    /// A user-visible warning; the transcript was not touched.
    Notice(String),
}

/// One chat session: transcript, flags, config, and adapters.
pub struct ChatSession {
    transcript: Transcript,
    recording: bool,
    listening: bool,
    config: SessionConfig,
    generator: Box<dyn ReplyGenerator>,
    voice_in: Box<dyn VoiceInput>,
    voice_out: Box<dyn VoiceOutput>,
}

impl ChatSession {
    pub fn new(
        config: SessionConfig,
        generator: Box<dyn ReplyGenerator>,
        voice_in: Box<dyn VoiceInput>,
        voice_out: Box<dyn VoiceOutput>,
    ) -> Self {
        Self {
            transcript: Transcript::new(),
            recording: false,
            listening: false,
            config,
            generator,
            voice_in,
            voice_out,
        }
    }

    /// Read-only transcript snapshot.
    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    /// Run one command to completion.
    ///
    /// Inference and synthesis failures propagate as `Err` with no retry;
    /// voice-input failures are caught and surfaced as a notice event
    /// instead, leaving the transcript unmodified.
    pub async fn dispatch(
        &mut self,
        command: Command,
        mut on_event: impl FnMut(SessionEvent),
    ) -> Result<(), String> {
        match command {
            Command::Submit(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Ok(());
                }
                if !credential::looks_valid(&self.config.credential) {
                    on_event(SessionEvent::Notice("Please enter your credentials!".into()));
                    return Ok(());
                }
                self.transcript.push(Message::user(text));
                self.generate_reply(&mut on_event).await
            }

            Command::ClearHistory => {
                self.transcript.clear();
                Ok(())
            }

            Command::StartRecording => {
                self.recording = true;
                self.listening = true;
                let heard = self.voice_in.listen().await;
                self.recording = false;
                self.listening = false;

                match heard {
                    Ok(text) => {
                        let message = Message::user(text);
                        on_event(SessionEvent::Voice(message.clone()));
                        self.transcript.push(message);
                        self.generate_reply(&mut on_event).await
                    }
                    Err(e) => {
                        on_event(SessionEvent::Notice(e.to_string()));
                        Ok(())
                    }
                }
            }

            Command::StopRecording => {
                self.recording = false;
                self.listening = false;
                Ok(())
            }

            Command::Listen(index) => {
                let message = self
                    .transcript
                    .get(index)
                    .ok_or_else(|| format!("no message at index {index}"))?;
                if message.role != Role::Assistant {
                    return Err(format!("message {index} is not an assistant reply"));
                }
                let wav = self.voice_out.synthesize(&message.content).await?;
                on_event(SessionEvent::Audio(wav));
                Ok(())
            }
        }
    }

    /// Build the prompt from the full transcript, stream the reply, and
    /// append the finished assistant turn.
    async fn generate_reply(
        &mut self,
        on_event: &mut impl FnMut(SessionEvent),
    ) -> Result<(), String> {
        let prompt = build_prompt(self.transcript.messages());
        let params = self.config.params.clamped();
        let mut stream = self
            .generator
            .generate(self.config.model.version(), &prompt, &params);

        let mut accumulated = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            // A failed fragment ends the reply; the user turn stays appended
            let fragment = fragment?;
            accumulated.push_str(&fragment);
            on_event(SessionEvent::Fragment {
                text: accumulated.clone(),
            });
        }

        let reply = Message::assistant(accumulated);
        self.transcript.push(reply.clone());
        on_event(SessionEvent::Reply(reply));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::types::GREETING;

    struct ScriptedGenerator {
        fragments: Vec<Result<String, String>>,
    }

    impl ReplyGenerator for ScriptedGenerator {
        fn generate(&self, _: &str, _: &str, _: &GenerationParams) -> ReplyStream {
            ReplyStream::scripted(self.fragments.clone())
        }
    }

    struct ScriptedVoice {
        heard: Result<String, RecognizeError>,
    }

    #[async_trait]
    impl VoiceInput for ScriptedVoice {
        async fn listen(&self) -> Result<String, RecognizeError> {
            self.heard.clone()
        }
    }

    struct ScriptedSynth {
        wav: Result<Vec<u8>, String>,
    }

    #[async_trait]
    impl VoiceOutput for ScriptedSynth {
        async fn synthesize(&self, _: &str) -> Result<Vec<u8>, String> {
            self.wav.clone()
        }
    }

    fn valid_token() -> String {
        let mut t = String::from("r8_");
        while t.len() < 40 {
            t.push('a');
        }
        t
    }

    fn session(
        fragments: Vec<Result<String, String>>,
        heard: Result<String, RecognizeError>,
        wav: Result<Vec<u8>, String>,
    ) -> ChatSession {
        ChatSession::new(
            SessionConfig {
                credential: valid_token(),
                ..Default::default()
            },
            Box::new(ScriptedGenerator { fragments }),
            Box::new(ScriptedVoice { heard }),
            Box::new(ScriptedSynth { wav }),
        )
    }

    fn text_session(fragments: Vec<Result<String, String>>) -> ChatSession {
        session(
            fragments,
            Err(RecognizeError::Unrecognized),
            Ok(vec![0u8; 4]),
        )
    }

    #[tokio::test]
    async fn submit_streams_accumulated_renders() {
        let mut s = text_session(vec![Ok("Hel".into()), Ok("lo".into())]);
        let mut events = Vec::new();
        s.dispatch(Command::Submit("hi".into()), |e| events.push(e))
            .await
            .unwrap();

        let renders: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Fragment { text } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(renders, vec!["Hel".to_string(), "Hello".to_string()]);

        // Exactly one completed reply, appended once
        assert!(matches!(events.last(), Some(SessionEvent::Reply(m)) if m.content == "Hello"));
        let contents: Vec<&str> = s.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![GREETING, "hi", "Hello"]);
    }

    #[tokio::test]
    async fn submit_blocked_without_valid_credential() {
        let mut s = text_session(vec![Ok("never".into())]);
        s.config_mut().credential = "r8_short".into();

        let mut events = Vec::new();
        s.dispatch(Command::Submit("hi".into()), |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SessionEvent::Notice(n) if n.contains("credentials")));
        assert_eq!(s.messages().len(), 1);
    }

    #[tokio::test]
    async fn empty_submit_is_ignored() {
        let mut s = text_session(vec![Ok("never".into())]);
        let mut events = Vec::new();
        s.dispatch(Command::Submit("   ".into()), |e| events.push(e))
            .await
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(s.messages().len(), 1);
    }

    #[tokio::test]
    async fn clear_history_resets_to_greeting() {
        let mut s = text_session(vec![Ok("ok".into())]);
        for i in 0..5 {
            s.dispatch(Command::Submit(format!("msg {i}")), |_| {})
                .await
                .unwrap();
        }
        assert!(s.messages().len() > 1);

        s.dispatch(Command::ClearHistory, |_| {}).await.unwrap();
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0], Message::assistant(GREETING));
    }

    #[tokio::test]
    async fn inference_error_propagates_and_keeps_user_turn() {
        let mut s = text_session(vec![Ok("par".into()), Err("boom".into())]);
        let err = s
            .dispatch(Command::Submit("hi".into()), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, "boom");

        // User turn stays; no assistant turn was appended
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.messages()[1], Message::user("hi"));
    }

    #[tokio::test]
    async fn voice_turn_appends_and_generates() {
        let mut s = session(
            vec![Ok("Sure.".into())],
            Ok("turn on the lights".into()),
            Ok(vec![]),
        );
        let mut events = Vec::new();
        s.dispatch(Command::StartRecording, |e| events.push(e))
            .await
            .unwrap();

        assert!(matches!(&events[0], SessionEvent::Voice(m) if m.content == "turn on the lights"));
        let contents: Vec<&str> = s.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![GREETING, "turn on the lights", "Sure."]);
        assert!(!s.is_recording());
        assert!(!s.is_listening());
    }

    #[tokio::test]
    async fn unrecognized_voice_leaves_transcript_untouched() {
        let mut s = session(
            vec![Ok("never".into())],
            Err(RecognizeError::Unrecognized),
            Ok(vec![]),
        );
        let mut events = Vec::new();
        s.dispatch(Command::StartRecording, |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SessionEvent::Notice(n) if n.contains("did not understand")));
        assert_eq!(s.messages().len(), 1);
        assert!(!s.is_recording());
        assert!(!s.is_listening());
    }

    #[tokio::test]
    async fn recognizer_request_error_leaves_transcript_untouched() {
        let mut s = session(
            vec![Ok("never".into())],
            Err(RecognizeError::Request("connection refused".into())),
            Ok(vec![]),
        );
        let mut events = Vec::new();
        s.dispatch(Command::StartRecording, |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], SessionEvent::Notice(n) if n.contains("speech recognition service"))
        );
        assert_eq!(s.messages().len(), 1);
    }

    #[tokio::test]
    async fn stop_recording_clears_flags() {
        let mut s = text_session(vec![]);
        s.dispatch(Command::StopRecording, |_| {}).await.unwrap();
        assert!(!s.is_recording());
        assert!(!s.is_listening());
    }

    #[tokio::test]
    async fn listen_speaks_assistant_messages_only() {
        let mut s = session(
            vec![Ok("ok".into())],
            Err(RecognizeError::Unrecognized),
            Ok(vec![1, 2, 3]),
        );
        s.dispatch(Command::Submit("hi".into()), |_| {})
            .await
            .unwrap();

        // Index 1 is the user turn
        let err = s.dispatch(Command::Listen(1), |_| {}).await.unwrap_err();
        assert!(err.contains("not an assistant reply"));

        // Index 0 is the greeting
        let mut events = Vec::new();
        s.dispatch(Command::Listen(0), |e| events.push(e))
            .await
            .unwrap();
        assert_eq!(events, vec![SessionEvent::Audio(vec![1, 2, 3])]);
    }

    #[tokio::test]
    async fn listen_out_of_range_errors() {
        let mut s = text_session(vec![]);
        assert!(s.dispatch(Command::Listen(9), |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn synthesis_failure_propagates() {
        let mut s = session(
            vec![],
            Err(RecognizeError::Unrecognized),
            Err("engine offline".into()),
        );
        let err = s.dispatch(Command::Listen(0), |_| {}).await.unwrap_err();
        assert_eq!(err, "engine offline");
    }
}

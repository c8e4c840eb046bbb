//! confab CLI — voice-enabled Llama 2 chat.
//!
//! ```text
//! confab chat [--model 7b|13b] [--temperature 0.1] [--top-p 0.9] [--max-length 120]
//! confab ask "why is the sky blue?"
//! confab listen                      # capture one utterance, print the transcript
//! confab say "hello world"           # synthesize and play
//! confab serve [--port 2010] [--host 127.0.0.1]
//! confab engine [--assets-dir models]
//! ```
//!
//! The inference credential comes from `REPLICATE_API_TOKEN`; an optional
//! recognizer key comes from `RECOGNIZER_API_KEY`.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use confab_core::credential;
use confab_core::types::{ChatModel, GenerationParams, RecognizerConfig, SynthConfig};
use confab_lib::engine::SynthEngineManager;
use confab_lib::playback::Playback;
use confab_lib::replicate::ReplicateClient;
use confab_lib::session::{ChatSession, Command as Action, SessionConfig, SessionEvent, VoiceInput, VoiceOutput};
use confab_lib::stt::VoiceListener;
use confab_lib::synth::Synthesizer;

/// confab — chat with a hosted Llama 2 model, by keyboard or voice
#[derive(Parser)]
#[command(name = "confab", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct ModelArgs {
    /// Model to chat with: 7b or 13b
    #[arg(long, default_value = "7b")]
    model: String,
    /// Sampling temperature (0.01–5.0)
    #[arg(long, default_value = "0.1")]
    temperature: f32,
    /// Nucleus sampling cutoff (0.01–1.0)
    #[arg(long = "top-p", default_value = "0.9")]
    top_p: f32,
    /// Maximum reply length (32–128, step 8)
    #[arg(long, default_value = "120")]
    max_length: u32,
}

#[derive(Args, Clone)]
struct VoiceArgs {
    /// Remote transcription endpoint
    #[arg(long, default_value = "https://api.openai.com/v1/audio/transcriptions")]
    recognizer_url: String,
    /// Local synthesis engine URL
    #[arg(long, default_value = "http://localhost:3001")]
    engine_url: String,
    /// Synthesis voice
    #[arg(long, default_value = "af_heart")]
    voice: String,
    /// Synthesis speed
    #[arg(long, default_value = "1.0")]
    speed: f32,
}

impl Default for VoiceArgs {
    fn default() -> Self {
        Self {
            recognizer_url: RecognizerConfig::default().endpoint,
            engine_url: SynthConfig::default().engine_url,
            voice: SynthConfig::default().voice,
            speed: SynthConfig::default().speed,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (type, /listen, /say N, /clear, /quit)
    Chat {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        voice: VoiceArgs,
    },
    /// One-shot prompt, streamed reply to stdout
    Ask {
        /// The prompt text
        text: String,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Capture one utterance and print the recognized text
    Listen {
        #[command(flatten)]
        voice: VoiceArgs,
    },
    /// Synthesize text and play it
    Say {
        /// Text to speak
        text: String,
        #[command(flatten)]
        voice: VoiceArgs,
    },
    /// Run the HTTP API for an external shell
    Serve {
        /// Listen port
        #[arg(long, default_value = "2010")]
        port: u16,
        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        voice: VoiceArgs,
    },
    /// Download synthesis assets and run the local engine until Ctrl-C
    Engine {
        /// Directory the model assets live in
        #[arg(long, default_value = "models")]
        assets_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Chat { model, voice } => chat(model, voice).await,
        Command::Ask { text, model } => ask(text, model).await,
        Command::Listen { voice } => listen(voice).await,
        Command::Say { text, voice } => say(text, voice).await,
        Command::Serve {
            port,
            host,
            model,
            voice,
        } => serve(port, host, model, voice).await,
        Command::Engine { assets_dir } => engine(assets_dir).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ─── Session assembly ──────────────────────────────────────────────────────

fn api_token() -> String {
    std::env::var("REPLICATE_API_TOKEN").unwrap_or_default()
}

fn recognizer_config(voice: &VoiceArgs) -> RecognizerConfig {
    RecognizerConfig {
        endpoint: voice.recognizer_url.clone(),
        api_key: std::env::var("RECOGNIZER_API_KEY").ok(),
        ..Default::default()
    }
}

fn synth_config(voice: &VoiceArgs) -> SynthConfig {
    SynthConfig {
        engine_url: voice.engine_url.clone(),
        voice: voice.voice.clone(),
        speed: voice.speed,
    }
}

fn build_session(model: &ModelArgs, voice: &VoiceArgs) -> Result<ChatSession, String> {
    let token = api_token();
    if !credential::looks_valid(&token) {
        eprintln!("warning: REPLICATE_API_TOKEN is missing or malformed; input is blocked until it is set");
    }

    let config = SessionConfig {
        credential: token.clone(),
        model: ChatModel::parse(&model.model)?,
        params: GenerationParams {
            temperature: model.temperature,
            top_p: model.top_p,
            max_length: model.max_length,
            repetition_penalty: 1.0,
        },
    };

    Ok(ChatSession::new(
        config,
        Box::new(ReplicateClient::new(token)),
        Box::new(VoiceListener::new(recognizer_config(voice))),
        Box::new(Synthesizer::new(synth_config(voice))),
    ))
}

// ─── Subcommands ───────────────────────────────────────────────────────────

async fn chat(model: ModelArgs, voice: VoiceArgs) -> Result<(), String> {
    let mut session = build_session(&model, &voice)?;
    let playback = Playback::spawn();

    println!("Assistant: {}", session.messages()[0].content);
    println!("(type /listen for voice input, /say N to hear reply N, /clear, /quit)");

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::AsyncBufReadExt::lines(tokio::io::BufReader::new(stdin));

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(format!("stdin error: {e}")),
        };

        let action = match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => Action::ClearHistory,
            "/listen" => Action::StartRecording,
            trimmed if trimmed.starts_with("/say") => {
                match trimmed.trim_start_matches("/say").trim().parse::<usize>() {
                    Ok(index) => Action::Listen(index),
                    Err(_) => {
                        eprintln!("usage: /say <message index>");
                        continue;
                    }
                }
            }
            text => Action::Submit(text.to_string()),
        };

        let cleared = action == Action::ClearHistory;
        if let Err(e) = run_action(&mut session, action, &playback).await {
            eprintln!("error: {e}");
        }
        if cleared {
            println!("(history cleared)");
        }
    }

    Ok(())
}

/// Dispatch one action, rendering events to the terminal.
async fn run_action(
    session: &mut ChatSession,
    action: Action,
    playback: &Playback,
) -> Result<(), String> {
    let submitting = matches!(action, Action::Submit(_) | Action::StartRecording);
    if matches!(action, Action::StartRecording) {
        println!("Listening...");
    }

    let mut rendered = 0usize;
    let mut reply_open = false;
    let result = session
        .dispatch(action, |event| match event {
            SessionEvent::Voice(message) => {
                println!("You said: {}", message.content);
            }
            SessionEvent::Fragment { text } => {
                if !reply_open {
                    print!("Assistant: ");
                    reply_open = true;
                }
                print!("{}", &text[rendered..]);
                let _ = std::io::stdout().flush();
                rendered = text.len();
            }
            SessionEvent::Reply(_) => {
                if !reply_open {
                    print!("Assistant: ");
                }
                println!();
            }
            SessionEvent::Audio(wav) => playback.play(wav),
            SessionEvent::Notice(notice) => eprintln!("! {notice}"),
        })
        .await;

    if result.is_err() && submitting && reply_open {
        // Leave the partial reply line terminated
        println!();
    }
    result
}

async fn ask(text: String, model: ModelArgs) -> Result<(), String> {
    let mut session = build_session(&model, &VoiceArgs::default())?;

    let mut rendered = 0usize;
    session
        .dispatch(Action::Submit(text), |event| {
            if let SessionEvent::Fragment { text } = event {
                print!("{}", &text[rendered..]);
                let _ = std::io::stdout().flush();
                rendered = text.len();
            }
        })
        .await?;
    println!();
    Ok(())
}

async fn listen(voice: VoiceArgs) -> Result<(), String> {
    let listener = VoiceListener::new(recognizer_config(&voice));
    eprintln!("Listening...");
    match listener.listen().await {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

async fn say(text: String, voice: VoiceArgs) -> Result<(), String> {
    let synth = Synthesizer::new(synth_config(&voice));
    if !synth.engine_reachable().await {
        eprintln!(
            "warning: synthesis engine not reachable at {}; run `confab engine` first",
            voice.engine_url
        );
    }
    let wav = synth.synthesize(&text).await?;
    let playback = Playback::spawn();
    playback.play_blocking(wav);
    Ok(())
}

async fn serve(port: u16, host: String, model: ModelArgs, voice: VoiceArgs) -> Result<(), String> {
    let session = build_session(&model, &voice)?;
    let shared = Arc::new(tokio::sync::Mutex::new(session));
    let app = confab_lib::server::router(shared);

    let addr = format!("{host}:{port}");
    eprintln!("confab listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))
}

async fn engine(assets_dir: PathBuf) -> Result<(), String> {
    let manager = SynthEngineManager::default();

    if manager.is_reachable().await {
        eprintln!("a synthesis engine is already answering; nothing to do");
        return Ok(());
    }

    manager
        .start(&assets_dir, |progress| {
            eprint!(
                "\r{}: {:>5.1}% ({}/{} bytes)   ",
                progress.asset, progress.percent, progress.bytes_done, progress.bytes_total
            );
            if progress.status == "complete" {
                eprintln!();
            }
        })
        .await?;

    let status = manager.status(&assets_dir).await;
    eprintln!(
        "synthesis engine ready on port {}; press Ctrl-C to stop",
        status.port
    );
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("signal error: {e}"))?;
    manager.stop().await;
    Ok(())
}

//! WAV playback on a dedicated OS thread.
//!
//! rodio's `OutputStream` is !Send, so a playback thread owns it and takes
//! commands over a channel. [`Playback`] is a cheap cloneable handle.

use std::io::Cursor;

use rodio::{Decoder, OutputStream, Sink};
use tracing::error;

enum PlayCmd {
    Play {
        wav: Vec<u8>,
        done: Option<std::sync::mpsc::Sender<()>>,
    },
    Stop,
}

/// Handle to the playback thread.
#[derive(Clone)]
pub struct Playback {
    tx: std::sync::mpsc::Sender<PlayCmd>,
}

impl Playback {
    /// Spawn the playback thread.
    pub fn spawn() -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<PlayCmd>();
        std::thread::Builder::new()
            .name("confab-playback".into())
            .spawn(move || playback_thread(rx))
            .expect("failed to spawn playback thread");
        Self { tx }
    }

    /// Queue WAV bytes for playback and return immediately.
    pub fn play(&self, wav: Vec<u8>) {
        let _ = self.tx.send(PlayCmd::Play { wav, done: None });
    }

    /// Play WAV bytes and block until playback finishes.
    pub fn play_blocking(&self, wav: Vec<u8>) {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let _ = self.tx.send(PlayCmd::Play {
            wav,
            done: Some(done_tx),
        });
        let _ = done_rx.recv();
    }

    /// Stop whatever is playing.
    pub fn stop(&self) {
        let _ = self.tx.send(PlayCmd::Stop);
    }
}

fn playback_thread(rx: std::sync::mpsc::Receiver<PlayCmd>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            error!("playback: failed to open audio output: {e}");
            return;
        }
    };

    let mut sink = Sink::try_new(&handle).expect("failed to create sink");

    while let Ok(cmd) = rx.recv() {
        match cmd {
            PlayCmd::Play { wav, done } => {
                match Decoder::new(Cursor::new(wav)) {
                    Ok(source) => sink.append(source),
                    Err(e) => error!("playback: undecodable audio: {e}"),
                }
                if let Some(done) = done {
                    sink.sleep_until_end();
                    let _ = done.send(());
                }
            }
            PlayCmd::Stop => {
                sink.stop();
                sink = Sink::try_new(&handle).expect("failed to create sink");
            }
        }
    }

    sink.stop();
}

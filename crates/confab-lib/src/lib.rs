//! confab-lib — Voice-enabled chat engine.
//!
//! Session state and command dispatch, streamed inference against the hosted
//! model API, microphone capture with voice recognition, local speech
//! synthesis, and the HTTP API an external shell talks to. Depends on
//! confab-core for pure types and text processing.

pub mod capture;
pub mod download;
pub mod engine;
pub mod playback;
pub mod replicate;
pub mod server;
pub mod session;
pub mod sse;
pub mod stt;
pub mod synth;

// Re-export confab-core for convenience
pub use confab_core;

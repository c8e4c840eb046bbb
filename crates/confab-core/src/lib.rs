//! confab-core — Pure types, prompt building, and text processing.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod credential;
pub mod prompt;
pub mod speech_text;
pub mod transcript;
pub mod types;
pub mod wav;

//! Prompt assembly — transcript → single dialogue blob for the model.
//!
//! The hosted chat models take one flat text prompt, not a structured
//! message list, so the transcript is replayed turn by turn with role
//! prefixes and the blob ends with an open "Assistant: " marker for the
//! model to complete.
//!
//! No length validation against the model context window happens here; long
//! transcripts pass through unchecked.

use crate::types::Message;

/// Fixed system preamble prepended to every prompt.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant. You do not respond as 'User' or pretend to be 'User'. You only respond once as 'Assistant'.";

/// Build the inference prompt from the full transcript.
///
/// The caller appends the new user turn to the transcript before calling
/// this, so each turn — including the newest — appears exactly once.
pub fn build_prompt(messages: &[Message]) -> String {
    let mut prompt = String::with_capacity(
        SYSTEM_PREAMBLE.len() + messages.iter().map(|m| m.content.len() + 16).sum::<usize>(),
    );
    prompt.push_str(SYSTEM_PREAMBLE);
    for message in messages {
        prompt.push_str(&message.role.to_string());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Assistant: ");
    prompt
}

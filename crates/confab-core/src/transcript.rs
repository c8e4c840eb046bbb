//! The conversation transcript — an append-only, ordered list of turns.
//!
//! Insertion order is significant: it defines the conversation history and
//! the prompt reconstruction. The transcript grows by append only and is
//! replaced wholesale on reset.

use crate::types::{Message, Role, GREETING};

/// Ordered chat history. Always starts with the fixed assistant greeting.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// A fresh transcript seeded with the greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    /// Append one turn.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Reset wholesale to a single greeting turn.
    pub fn clear(&mut self) {
        self.messages = vec![Message::assistant(GREETING)];
    }

    /// Read-only snapshot of the history.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Role of the most recent turn.
    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transcript_is_just_the_greeting() {
        let t = Transcript::new();
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0].role, Role::Assistant);
        assert_eq!(t.messages()[0].content, GREETING);
    }

    #[test]
    fn push_preserves_order() {
        let mut t = Transcript::new();
        t.push(Message::user("one"));
        t.push(Message::assistant("two"));
        t.push(Message::user("three"));
        let contents: Vec<&str> = t.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![GREETING, "one", "two", "three"]);
    }

    #[test]
    fn clear_resets_to_length_one() {
        let mut t = Transcript::new();
        for i in 0..20 {
            t.push(Message::user(format!("msg {i}")));
        }
        t.clear();
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0], Message::assistant(GREETING));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut t = Transcript::new();
        t.clear();
        t.clear();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn last_role_tracks_latest_turn() {
        let mut t = Transcript::new();
        assert_eq!(t.last_role(), Some(Role::Assistant));
        t.push(Message::user("hi"));
        assert_eq!(t.last_role(), Some(Role::User));
    }
}

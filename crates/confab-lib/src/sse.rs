//! Incremental Server-Sent-Events parsing for the inference stream.
//!
//! Feed raw response bytes in with [`SseParser::push`] and collect complete
//! events as they close. An event closes at a blank line; `data:` lines
//! accumulate (joined with `\n`), comment lines and unknown fields are
//! ignored, CRLF line endings are tolerated. Events that carry only an
//! `event:` field (no data) are still emitted — the stream's terminal
//! marker can arrive that way.

/// One parsed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// Joined `data:` payload. Empty when the event had no data lines.
    pub data: String,
}

/// Streaming SSE parser. Holds the partial line and partial event between
/// `push` calls.
#[derive(Debug, Default)]
pub struct SseParser {
    line: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of bytes, returning every event completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let text = String::from_utf8_lossy(bytes);
        let mut events = Vec::new();

        for ch in text.chars() {
            if ch != '\n' {
                self.line.push(ch);
                continue;
            }
            let line = std::mem::take(&mut self.line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.take_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Emit any unterminated trailing event. Call once at end of stream.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            self.take_line(line);
        }
        if self.pending() {
            Some(self.emit())
        } else {
            None
        }
    }

    fn pending(&self) -> bool {
        self.event.is_some() || !self.data.is_empty()
    }

    fn emit(&mut self) -> SseEvent {
        let event = SseEvent {
            event: self.event.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        event
    }

    fn take_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Event boundary
            if self.pending() {
                return Some(self.emit());
            }
            return None;
        }
        if line.starts_with(':') {
            // Comment
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            // A field name with no colon has an empty value per the SSE spec
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut p = SseParser::new();
        let events = p.push(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn event_type_and_data() {
        let mut p = SseParser::new();
        let events = p.push(b"event: output\ndata: Hel\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("output"));
        assert_eq!(events[0].data, "Hel");
    }

    #[test]
    fn event_without_data_still_emitted() {
        let mut p = SseParser::new();
        let events = p.push(b"event: done\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("done"));
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn data_split_across_pushes() {
        let mut p = SseParser::new();
        assert!(p.push(b"data: Hel").is_empty());
        let events = p.push(b"lo\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "Hello");
    }

    #[test]
    fn multi_line_data_joined() {
        let mut p = SseParser::new();
        let events = p.push(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn empty_data_line_preserved() {
        let mut p = SseParser::new();
        let events = p.push(b"data:\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn comments_and_unknown_fields_ignored() {
        let mut p = SseParser::new();
        let events = p.push(b": keepalive\nid: 7\nretry: 500\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn crlf_tolerated() {
        let mut p = SseParser::new();
        let events = p.push(b"data: hi\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hi");
    }

    #[test]
    fn multiple_events_one_chunk() {
        let mut p = SseParser::new();
        let events = p.push(b"event: output\ndata: a\n\nevent: output\ndata: b\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a");
        assert_eq!(events[1].data, "b");
    }

    #[test]
    fn flush_emits_trailing_event() {
        let mut p = SseParser::new();
        assert!(p.push(b"data: tail").is_empty());
        let tail = p.flush();
        assert_eq!(tail.unwrap().data, "tail");
        assert!(p.flush().is_none());
    }

    #[test]
    fn colon_in_value_kept() {
        let mut p = SseParser::new();
        let events = p.push(b"data: {\"a\":\"b\"}\n\n");
        assert_eq!(events[0].data, "{\"a\":\"b\"}");
    }
}

//! Incremental decoder for Server-Sent-Events framing.
//!
//! Feed raw byte chunks in whatever sizes the transport delivers them;
//! complete frames come out as soon as their terminating blank line arrives.
//! Field lines are `event:`, `data:` (repeatable, joined with `\n`) and
//! `id:`; `:` comment lines and unknown fields are ignored per the SSE
//! grammar. Frames without an event name are dropped silently: they are
//! keep-alives, not errors.

use crate::protocol::EventFrame;

/// Stateful SSE decoder. One instance per open stream; partial lines and
/// partial frames carry over between [`feed`](FrameDecoder::feed) calls.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<EventFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            let mut line = &line[..line.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if let Some(frame) = self.take_line(&String::from_utf8_lossy(line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Process one complete line; returns a frame when the line terminates one.
    fn take_line(&mut self, line: &str) -> Option<EventFrame> {
        if line.is_empty() {
            return self.finish_frame();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            // A field name with no colon has an empty value.
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn finish_frame(&mut self) -> Option<EventFrame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        let id = self.id.take();

        match event {
            Some(event) if !event.is_empty() => {
                Some(EventFrame::new(event, data.join("\n"), id))
            }
            // Unnamed frames (keep-alives, bare data) are dropped.
            _ => None,
        }
    }
}

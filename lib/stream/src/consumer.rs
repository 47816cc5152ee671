//! Consumer side of the wire protocol.
//!
//! Push-based decoder: the transport feeds raw chunks in, and the
//! consumer hands back ordered text deltas plus a single completion
//! signal. Framed mode reassembles `data:` frames across arbitrary
//! chunk boundaries; plain mode forwards every chunk unbuffered.

use crate::relay::StreamMode;

/// One decoded wire update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// An incremental piece of assistant text, in arrival order.
    Delta(String),
    /// The response is complete. Emitted at most once per response.
    Done,
}

/// Incremental decoder for one streamed response.
///
/// Feed raw transport chunks through [`feed`](Self::feed); call
/// [`finish`](Self::finish) once at end-of-stream to flush any
/// buffered remainder and emit the completion signal if the wire
/// never carried one.
#[derive(Debug)]
pub struct StreamConsumer {
    mode: StreamMode,
    buffer: String,
    done: bool,
}

impl StreamConsumer {
    #[must_use]
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            buffer: String::new(),
            done: false,
        }
    }

    /// True once the completion signal has been emitted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decodes one transport chunk into zero or more updates.
    ///
    /// Framed mode appends to the internal buffer and extracts every
    /// complete frame (delimited by a blank line), retaining the
    /// remainder for the next chunk. Plain mode forwards the chunk
    /// as a single delta with no buffering.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        if self.done {
            return Vec::new();
        }
        match self.mode {
            StreamMode::Plain => {
                let text = String::from_utf8_lossy(chunk).into_owned();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![StreamUpdate::Delta(text)]
                }
            }
            StreamMode::Framed => {
                self.buffer.push_str(&String::from_utf8_lossy(chunk));
                let mut updates = Vec::new();
                while let Some(boundary) = self.buffer.find("\n\n") {
                    let frame: String = self.buffer.drain(..boundary + 2).collect();
                    self.decode_frame(frame.trim_end_matches('\n'), &mut updates);
                    if self.done {
                        break;
                    }
                }
                updates
            }
        }
    }

    /// Flushes the buffered remainder and closes the response.
    ///
    /// A transport that ends without a completion frame still yields
    /// exactly one [`StreamUpdate::Done`]; calling `finish` after the
    /// wire already signalled completion yields nothing further.
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        if self.done {
            return updates;
        }
        if self.mode == StreamMode::Framed && !self.buffer.trim().is_empty() {
            let remainder = std::mem::take(&mut self.buffer);
            self.decode_frame(remainder.trim_end_matches('\n'), &mut updates);
        }
        if !self.done {
            self.done = true;
            updates.push(StreamUpdate::Done);
        }
        updates
    }

    /// Decodes a single complete frame into updates.
    fn decode_frame(&mut self, frame: &str, updates: &mut Vec<StreamUpdate>) {
        let payload = Self::frame_payload(frame);
        if payload.is_empty() {
            return;
        }
        if payload == "[DONE]" {
            self.done = true;
            updates.push(StreamUpdate::Done);
            return;
        }
        match serde_json::from_str::<serde_json::Value>(&payload) {
            Ok(value) => {
                if value.get("type").and_then(|t| t.as_str()) == Some("done") {
                    self.done = true;
                    updates.push(StreamUpdate::Done);
                } else if let Some(delta) = Self::delta_text(&value) {
                    if !delta.is_empty() {
                        updates.push(StreamUpdate::Delta(delta));
                    }
                }
                // Other structured payloads (tool lifecycle) carry no
                // renderable text and are skipped.
            }
            // Not JSON: the payload is displayable text as-is.
            Err(_) => updates.push(StreamUpdate::Delta(payload)),
        }
    }

    /// Joins the payload lines of a frame, stripping the line marker.
    fn frame_payload(frame: &str) -> String {
        let mut lines = Vec::new();
        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                lines.push(rest.trim_start());
            }
        }
        lines.join("\n")
    }

    /// Extracts incremental text from a structured payload.
    ///
    /// Field priority: `textDelta`, then `delta`, then `value`, then
    /// `text`. The first present string wins.
    fn delta_text(value: &serde_json::Value) -> Option<String> {
        for field in ["textDelta", "delta", "value", "text"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
        None
    }
}

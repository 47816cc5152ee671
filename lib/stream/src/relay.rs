//! Producer side of the wire protocol.
//!
//! Converts the orchestrator's internal event sequence into wire
//! chunks. In framed mode each chunk is a self-delimited frame of
//! marker-prefixed lines terminated by a blank line; in plain mode
//! every text delta is forwarded as-is.

use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use jal_mittar_ai::{ChatEvent, ChatEventStream};

/// Wire form negotiated with the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Self-delimited `data:` frames with a `[DONE]` sentinel.
    Framed,
    /// Raw chunk passthrough, no framing.
    Plain,
}

/// Callback invoked exactly once with the complete reassembled text.
///
/// Attached to the generation operation itself, not to the outbound
/// transport write: the assistant turn is persisted once generation
/// completes even if the caller's connection has already dropped.
pub type FinishCallback = Box<dyn FnOnce(String) -> BoxFuture<'static, ()> + Send>;

/// Encodes one event as a framed-mode frame, if it is wire-visible.
fn encode_frame(event: &ChatEvent) -> Option<String> {
    match event {
        ChatEvent::TextDelta(delta) => {
            let body = serde_json::json!({ "textDelta": delta });
            Some(format!("data: {body}\n\n"))
        }
        ChatEvent::ToolStarted { id, name } => {
            let body = serde_json::json!({
                "type": "tool-call",
                "toolCallId": id,
                "toolName": name,
            });
            Some(format!("data: {body}\n\n"))
        }
        ChatEvent::ToolFinished { id, name, ok } => {
            let body = serde_json::json!({
                "type": "tool-result",
                "toolCallId": id,
                "toolName": name,
                "ok": ok,
            });
            Some(format!("data: {body}\n\n"))
        }
        ChatEvent::Completed { .. } => Some("data: [DONE]\n\n".to_string()),
    }
}

/// Relays an orchestrated event stream onto the wire.
///
/// The returned stream yields wire chunks ready to write to the
/// transport. `on_finish` fires exactly once with the reassembled
/// answer: on the generator's completion event, or — if the stream
/// ends without one — at end-of-stream with whatever text accumulated.
/// Generator errors end the stream without firing the callback.
pub fn relay(
    events: ChatEventStream,
    mode: StreamMode,
    on_finish: FinishCallback,
) -> impl Stream<Item = String> + Send {
    let mut events = events;
    let mut on_finish = Some(on_finish);

    async_stream::stream! {
        let mut accumulated = String::new();
        let mut completed = false;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "generation stream failed mid-response");
                    return;
                }
            };

            if let ChatEvent::TextDelta(delta) = &event {
                accumulated.push_str(delta);
            }

            let settled = match &event {
                ChatEvent::Completed { text } => Some(text.clone()),
                _ => None,
            };

            match mode {
                StreamMode::Framed => {
                    if let Some(frame) = encode_frame(&event) {
                        yield frame;
                    }
                }
                StreamMode::Plain => {
                    if let ChatEvent::TextDelta(delta) = event {
                        yield delta;
                    }
                }
            }

            if let Some(text) = settled {
                completed = true;
                if let Some(callback) = on_finish.take() {
                    callback(text).await;
                }
                break;
            }
        }

        // A stream that ended without settling still finalizes once,
        // with the text reassembled from the deltas seen so far.
        if !completed {
            if let Some(callback) = on_finish.take() {
                callback(accumulated).await;
            }
        }
    }
}

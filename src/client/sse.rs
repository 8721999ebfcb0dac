//! Server-Sent Events (SSE) stream handling for `/run/stream`.
//!
//! Decodes a chunked response body into SSE frames and turns each frame with
//! a known event name into a [`StreamEvent`]. The stream is pulled lazily:
//! one chunk is read only when no complete frame is buffered, and the body is
//! released as soon as a terminal (`done` / `error`) event is produced.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::{Map, Value};

use crate::error::{AgentKernelError, AgentKernelResult};
use crate::types::{StreamEvent, StreamEventType, StreamOutput};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;
type ShutdownSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// How an [`EventStream`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A `done` or `error` event was produced.
    Completed,
    /// The body ended, or failed to read, before a terminal event.
    Truncated,
    /// The owning client was closed while the stream was open.
    Cancelled,
}

/// A lazily decoded sequence of [`StreamEvent`]s from one response body.
///
/// Events arrive in the order the server sent them. The sequence ends after a
/// terminal event, when the body ends, or when the client is closed; check
/// [`termination()`](Self::termination) to tell these apart. A stream is a
/// single pass over a single body and cannot be restarted.
///
/// # Example
///
/// ```no_run
/// # async fn example(mut stream: agentkernel_rs::client::EventStream) {
/// while let Some(event) = stream.next().await {
///     match event {
///         Ok(event) => println!("{}: {:?}", event.event_type, event.data),
///         Err(e) => eprintln!("stream error: {}", e),
///     }
/// }
/// # }
/// ```
pub struct EventStream {
    body: Option<ByteStream>,
    decoder: FrameDecoder,
    shutdown: Option<ShutdownSignal>,
    termination: Option<Termination>,
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("termination", &self.termination)
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Wrap a chunked byte stream, such as `reqwest::Response::bytes_stream()`.
    pub fn new<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let body = body.map(|chunk| chunk.map_err(|e| e.to_string()));
        Self {
            body: Some(Box::pin(body)),
            decoder: FrameDecoder::default(),
            shutdown: None,
            termination: None,
        }
    }

    /// End the stream early once `signal` resolves.
    pub(crate) fn with_shutdown<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Some(Box::pin(signal));
        self
    }

    /// Get the next event from the stream.
    ///
    /// Returns `None` once the stream has ended. Returns `Some(Err(..))` only
    /// if the body fails mid-read; the stream ends right after.
    pub async fn next(&mut self) -> Option<AgentKernelResult<StreamEvent>> {
        futures::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// How the stream ended, or `None` while it is still open.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Drain the stream, concatenating `output` text.
    ///
    /// Fails with [`AgentKernelError::Api`] carrying the message of an
    /// `error` event, and with [`AgentKernelError::Stream`] if the stream ends
    /// without a terminal event.
    pub async fn collect_output(mut self) -> AgentKernelResult<StreamOutput> {
        let mut output = String::new();
        while let Some(event) = self.next().await {
            let event = event?;
            match event.event_type {
                StreamEventType::Output => {
                    if let Some(text) = event.output() {
                        output.push_str(text);
                    }
                }
                StreamEventType::Done => {
                    return Ok(StreamOutput {
                        output,
                        exit_code: event.exit_code(),
                    });
                }
                StreamEventType::Error => {
                    return Err(AgentKernelError::Api(
                        event.message().unwrap_or("stream reported an error").to_string(),
                    ));
                }
                StreamEventType::Started | StreamEventType::Progress => {}
            }
        }
        Err(match self.termination {
            Some(Termination::Cancelled) => {
                AgentKernelError::Stream("stream cancelled: client is closed".to_string())
            }
            _ => AgentKernelError::Stream("stream ended before a done event".to_string()),
        })
    }

    fn finish(&mut self, termination: Termination) {
        tracing::debug!(?termination, "event stream finished");
        self.termination = Some(termination);
        // Dropping the body releases the connection.
        self.body = None;
        self.shutdown = None;
    }
}

impl Stream for EventStream {
    type Item = AgentKernelResult<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.termination.is_some() {
                return Poll::Ready(None);
            }

            if let Some(shutdown) = this.shutdown.as_mut() {
                if shutdown.as_mut().poll(cx).is_ready() {
                    this.finish(Termination::Cancelled);
                    return Poll::Ready(None);
                }
            }

            while let Some(frame) = this.decoder.next_frame() {
                if let Some(event) = decode_frame(frame) {
                    if event.is_terminal() {
                        this.finish(Termination::Completed);
                    }
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            let Some(body) = this.body.as_mut() else {
                this.finish(Termination::Truncated);
                return Poll::Ready(None);
            };

            match body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.decoder.push(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    this.finish(Termination::Truncated);
                    return Poll::Ready(Some(Err(AgentKernelError::Stream(format!(
                        "error reading event stream: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    this.finish(Termination::Truncated);
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// One dispatched SSE frame: the last `event:` name and the joined `data:`
/// lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame decoder.
///
/// Bytes are buffered until a full line is available, so UTF-8 sequences
/// split across chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct FrameDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<SseFrame> {
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        None
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        // Blank line = frame boundary.
        if line.is_empty() {
            return self.dispatch();
        }

        // Comments are keep-alive signals.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id:, retry: and unknown fields carry nothing we use.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// Turn a frame into an event. Frames with a missing or unknown event name
/// are skipped; payloads that are not a JSON object are kept under `raw`.
pub(crate) fn decode_frame(frame: SseFrame) -> Option<StreamEvent> {
    let Some(event_type) = frame.event.as_deref().and_then(StreamEventType::from_name) else {
        tracing::trace!(event = ?frame.event, "skipping unrecognized stream frame");
        return None;
    };

    let data = match serde_json::from_str::<Value>(&frame.data) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("raw".to_string(), Value::String(frame.data));
            map
        }
    };

    Some(StreamEvent::new(event_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frames(input: &str) -> Vec<SseFrame> {
        let mut decoder = FrameDecoder::default();
        decoder.push(input.as_bytes());
        std::iter::from_fn(|| decoder.next_frame()).collect()
    }

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_single_frame() {
        assert_eq!(
            frames("event: output\ndata: {\"data\":\"hi\"}\n\n"),
            vec![frame("output", "{\"data\":\"hi\"}")]
        );
    }

    #[test]
    fn test_frame_needs_blank_line() {
        assert!(frames("event: done\ndata: {}\n").is_empty());
    }

    #[test]
    fn test_multiple_data_lines_are_joined() {
        assert_eq!(
            frames("event: output\ndata: a\ndata: b\n\n"),
            vec![frame("output", "a\nb")]
        );
    }

    #[test]
    fn test_crlf_and_no_space_after_colon() {
        assert_eq!(
            frames("event:started\r\ndata:{}\r\n\r\n"),
            vec![frame("started", "{}")]
        );
    }

    #[test]
    fn test_comments_and_ignored_fields() {
        assert_eq!(
            frames(": keepalive\nid: 7\nretry: 1000\nevent: done\ndata: {}\n\n"),
            vec![frame("done", "{}")]
        );
    }

    #[test]
    fn test_empty_frames_not_dispatched() {
        assert!(frames("\n\n: ping\n\n").is_empty());
    }

    #[test]
    fn test_split_across_chunks() {
        let input = "event: output\ndata: {\"data\":\"héllo\"}\n\n";
        let bytes = input.as_bytes();
        let mut decoder = FrameDecoder::default();
        let mut out = Vec::new();
        // One byte at a time, splitting the two-byte 'é'.
        for b in bytes {
            decoder.push(std::slice::from_ref(b));
            while let Some(f) = decoder.next_frame() {
                out.push(f);
            }
        }
        assert_eq!(out, vec![frame("output", "{\"data\":\"héllo\"}")]);
    }

    #[test]
    fn test_decode_known_frame() {
        let event = decode_frame(frame("done", "{\"exit_code\":0}")).unwrap();
        assert_eq!(event.event_type, StreamEventType::Done);
        assert_eq!(event.exit_code(), Some(0));
    }

    #[test]
    fn test_decode_unknown_frame_skipped() {
        assert!(decode_frame(frame("heartbeat", "{}")).is_none());
        assert!(decode_frame(SseFrame {
            event: None,
            data: "{}".into()
        })
        .is_none());
    }

    #[test]
    fn test_decode_malformed_payload_kept_raw() {
        let event = decode_frame(frame("output", "{not json")).unwrap();
        assert_eq!(event.raw(), Some("{not json"));

        let event = decode_frame(frame("progress", "42")).unwrap();
        assert_eq!(event.data, json!({"raw": "42"}).as_object().cloned().unwrap());
    }
}

use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::errors::TransportError;
use crate::openai::request::RequestSpec;
use crate::openai::sse::{Frame, SseDecoder};
use crate::openai::wire::ErrorEnvelope;

/// Raw response body chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Decoded event-stream frames.
pub type FrameStream =
    Pin<Box<dyn futures::Stream<Item = Result<Frame, TransportError>> + Send + 'static>>;

const MAX_ERROR_BODY: usize = 64 * 1024;

/// Opens one streaming exchange per call.
///
/// Implementations report only network-level failures as `Err`; any HTTP
/// response, whatever its status, is returned as a `Connection` so the
/// session can classify it. Dropping the `Connection` closes it.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: &RequestSpec) -> Result<Connection, TransportError>;
}

/// An open response: status line, content type, and the unread body.
pub struct Connection {
    status: u16,
    content_type: Option<String>,
    body: ByteStream,
}

impl Connection {
    pub fn new(status: u16, content_type: Option<String>, body: ByteStream) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Decodes the body into event-stream frames.
    ///
    /// The stream ends when the body ends; an incomplete trailing record is
    /// discarded.
    pub fn frames(self) -> FrameStream {
        struct State {
            body: ByteStream,
            decoder: SseDecoder,
            pending: VecDeque<Frame>,
            done: bool,
        }

        Box::pin(stream::try_unfold(
            State {
                body: self.body,
                decoder: SseDecoder::default(),
                pending: VecDeque::new(),
                done: false,
            },
            |mut state| async move {
                loop {
                    if let Some(frame) = state.pending.pop_front() {
                        return Ok(Some((frame, state)));
                    }
                    if state.done {
                        return Ok(None);
                    }

                    match state.body.next().await {
                        Some(Ok(chunk)) => {
                            state.pending.extend(state.decoder.push_chunk(&chunk));
                        }
                        Some(Err(e)) => return Err(e),
                        None => {
                            if state.decoder.has_pending() {
                                debug!("discarding incomplete event-stream record at end of body");
                            }
                            state.decoder.finish();
                            state.done = true;
                        }
                    }
                }
            },
        ))
    }

    /// Reads the (bounded) body of a failed response and returns a message
    /// suitable for `on_error`.
    pub async fn error_message(mut self) -> String {
        let mut raw = Vec::new();
        while let Some(Ok(chunk)) = self.body.next().await {
            raw.extend_from_slice(&chunk);
            if raw.len() >= MAX_ERROR_BODY {
                raw.truncate(MAX_ERROR_BODY);
                break;
            }
        }
        error_message_from_body(self.status, &raw)
    }
}

pub(crate) fn error_message_from_body(status: u16, raw: &[u8]) -> String {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(raw)
        && !envelope.error.message.trim().is_empty()
    {
        return envelope.error.message;
    }
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.is_empty() {
        format!("request failed with status {status}")
    } else {
        format!("request failed with status {status}: {text}")
    }
}

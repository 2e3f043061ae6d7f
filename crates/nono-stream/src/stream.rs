use std::borrow::Cow;
use std::fmt;

use crate::classify::{Observation, classify};
use crate::errors::ErrorKind;
use crate::openai::sse::Frame;
use crate::openai::wire::ChunkPayload;

/// Data payload that ends a stream normally.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Event name carrying a human-readable fatal error.
pub const FATAL_ERROR_EVENT: &str = "FatalError";

/// Lifecycle of one completion session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    Idle,
    Opening,
    Streaming,
    Finished,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Streaming => "streaming",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        })
    }
}

/// What the driver should do after handling one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Keep reading; deliver the delta if there is one.
    Continue(Option<String>),
    /// Deliver the trailing delta (if any), then finish.
    Finished(Option<String>),
    /// Terminate with this message.
    Failed(String),
    /// Drop the connection and reconnect.
    Retry(String),
}

impl FrameOutcome {
    /// Turns a classified observation into the driver's next step.
    ///
    /// `delta` rides along on `Continue`/`Finished`; `detail` becomes the
    /// reason of `Failed`/`Retry`.
    pub fn classified(
        observation: Observation<'_>,
        delta: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        match classify(&observation) {
            None => Self::Continue(delta),
            Some(ErrorKind::Stop) => Self::Finished(delta),
            Some(ErrorKind::Retriable) => Self::Retry(detail.into()),
            Some(ErrorKind::Fatal) => Self::Failed(detail.into()),
        }
    }
}

/// Interprets one frame of a chat-completions stream.
pub fn interpret_frame(frame: &Frame) -> FrameOutcome {
    if frame.event.as_deref() == Some(FATAL_ERROR_EVENT) {
        let message = frame.data.trim();
        let detail = if message.is_empty() {
            "completion stream reported a fatal error"
        } else {
            message
        };
        return FrameOutcome::classified(Observation::FatalEvent, None, detail);
    }

    let data = frame.data.trim();
    if data == DONE_SENTINEL {
        return FrameOutcome::classified(Observation::Done, None, "");
    }
    if data.is_empty() {
        return FrameOutcome::Continue(None);
    }

    let payload: ChunkPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            return FrameOutcome::classified(
                Observation::MalformedPayload,
                None,
                format!("malformed completion payload: {e}"),
            );
        }
    };
    let Some(choice) = payload.choices.into_iter().next() else {
        return FrameOutcome::Continue(None);
    };
    let delta = choice
        .delta
        .and_then(|d| d.content)
        .filter(|text| !text.is_empty());
    if choice.finish_reason.is_some() {
        FrameOutcome::classified(Observation::Done, delta, "")
    } else {
        FrameOutcome::Continue(delta)
    }
}

/// Caller-facing notification contract.
///
/// Exactly one of `on_finish`/`on_error` is called for a session that
/// finishes or fails; none are called once the session is cancelled.
pub trait CompletionCallbacks: Send + 'static {
    /// A non-empty delta; `is_first` is true only for the first one.
    fn on_message(&mut self, text: &str, is_first: bool);
    /// The concatenation of every delta passed to `on_message`.
    fn on_finish(&mut self, full_text: &str);
    fn on_error(&mut self, message: &str);
}

impl CompletionCallbacks for Box<dyn CompletionCallbacks> {
    fn on_message(&mut self, text: &str, is_first: bool) {
        (**self).on_message(text, is_first);
    }

    fn on_finish(&mut self, full_text: &str) {
        (**self).on_finish(full_text);
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }
}

/// Closure-backed `CompletionCallbacks`.
pub struct Callbacks<M, F, E> {
    on_message: M,
    on_finish: F,
    on_error: E,
}

impl<M, F, E> Callbacks<M, F, E>
where
    M: FnMut(&str, bool) + Send + 'static,
    F: FnMut(&str) + Send + 'static,
    E: FnMut(&str) + Send + 'static,
{
    pub fn new(on_message: M, on_finish: F, on_error: E) -> Self {
        Self {
            on_message,
            on_finish,
            on_error,
        }
    }
}

impl<M, F, E> CompletionCallbacks for Callbacks<M, F, E>
where
    M: FnMut(&str, bool) + Send + 'static,
    F: FnMut(&str) + Send + 'static,
    E: FnMut(&str) + Send + 'static,
{
    fn on_message(&mut self, text: &str, is_first: bool) {
        (self.on_message)(text, is_first);
    }

    fn on_finish(&mut self, full_text: &str) {
        (self.on_finish)(full_text);
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message);
    }
}

/// Per-invocation rewrite applied to each delta before it is surfaced and
/// accumulated. An empty result is not surfaced.
pub trait DeltaFilter: Send + 'static {
    /// `first_received` is true for the first non-empty delta the session
    /// receives, whether or not anything of it ends up surfaced.
    fn apply<'a>(&mut self, delta: &'a str, first_received: bool) -> Cow<'a, str>;
}

/// Surfaces deltas unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl DeltaFilter for PassThrough {
    fn apply<'a>(&mut self, delta: &'a str, _first_received: bool) -> Cow<'a, str> {
        Cow::Borrowed(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(content: &str) -> Frame {
        Frame::data(serde_json::json!({"choices":[{"delta":{"content":content}}]}).to_string())
    }

    #[test]
    fn content_delta_continues() {
        assert_eq!(
            interpret_frame(&delta("Hi")),
            FrameOutcome::Continue(Some("Hi".into()))
        );
    }

    #[test]
    fn role_only_and_empty_deltas_carry_no_text() {
        let role = Frame::data(r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#);
        assert_eq!(interpret_frame(&role), FrameOutcome::Continue(None));
        assert_eq!(interpret_frame(&delta("")), FrameOutcome::Continue(None));
        assert_eq!(interpret_frame(&Frame::data(r#"{"choices":[]}"#)), FrameOutcome::Continue(None));
    }

    #[test]
    fn done_sentinel_and_finish_reason_finish() {
        assert_eq!(interpret_frame(&Frame::data("[DONE]")), FrameOutcome::Finished(None));
        let last = Frame::data(r#"{"choices":[{"delta":{"content":"!"},"finish_reason":"stop"}]}"#);
        assert_eq!(interpret_frame(&last), FrameOutcome::Finished(Some("!".into())));
        let bare = Frame::data(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#);
        assert_eq!(interpret_frame(&bare), FrameOutcome::Finished(None));
    }

    #[test]
    fn fatal_error_event_fails_with_its_message() {
        let frame = Frame::named(FATAL_ERROR_EVENT, "model overloaded");
        assert_eq!(
            interpret_frame(&frame),
            FrameOutcome::Failed("model overloaded".into())
        );
    }

    #[test]
    fn malformed_payload_fails() {
        let outcome = interpret_frame(&Frame::data("{not json"));
        assert!(matches!(outcome, FrameOutcome::Failed(msg) if msg.contains("malformed")));
        let outcome = interpret_frame(&Frame::data(r#"{"choices":"nope"}"#));
        assert!(matches!(outcome, FrameOutcome::Failed(_)));
    }

    #[test]
    fn body_failures_classify_as_retry() {
        assert_eq!(
            FrameOutcome::classified(Observation::StreamClosed, None, "connection reset"),
            FrameOutcome::Retry("connection reset".into())
        );
        assert_eq!(
            FrameOutcome::classified(Observation::Done, Some("tail".into()), ""),
            FrameOutcome::Finished(Some("tail".into()))
        );
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Finished.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }
}

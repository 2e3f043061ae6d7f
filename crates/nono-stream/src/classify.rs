//! Maps connection and stream outcomes onto the failure taxonomy.

use crate::errors::ErrorKind;

const EVENT_STREAM: &str = "text/event-stream";

/// Something the session driver observed and needs classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation<'a> {
    /// Response headers arrived.
    Opened {
        status: u16,
        content_type: Option<&'a str>,
    },
    /// The request never produced a response (DNS, TCP, TLS, timeout).
    OpenFailed,
    /// A non-sentinel `data` payload did not decode as a delta.
    MalformedPayload,
    /// The body ended or failed before `[DONE]` or a `FatalError` event.
    StreamClosed,
    /// An explicit `FatalError` event arrived.
    FatalEvent,
    /// `[DONE]` or a frame carrying `finish_reason`.
    Done,
}

/// Returns `None` when the observation is not a failure.
pub fn classify(observation: &Observation<'_>) -> Option<ErrorKind> {
    match *observation {
        Observation::Opened {
            status,
            content_type,
        } => classify_open(status, content_type),
        Observation::OpenFailed | Observation::StreamClosed => Some(ErrorKind::Retriable),
        Observation::MalformedPayload | Observation::FatalEvent => Some(ErrorKind::Fatal),
        Observation::Done => Some(ErrorKind::Stop),
    }
}

fn classify_open(status: u16, content_type: Option<&str>) -> Option<ErrorKind> {
    match status {
        200..=299 if is_event_stream(content_type) => None,
        429 | 500..=599 => Some(ErrorKind::Retriable),
        _ => Some(ErrorKind::Fatal),
    }
}

fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(EVENT_STREAM))
}

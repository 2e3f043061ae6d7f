use std::fmt;

/// Errors returned by the public client API before a session is running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration (API key, endpoint, HTTP client).
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (for example an empty prompt).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Failure raised by a `StreamTransport` while opening or reading a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Creates a transport error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure taxonomy shared by the classifier and the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Surfaced once through `on_error`; the session terminates.
    Fatal,
    /// Invisible to the caller; the session reconnects.
    Retriable,
    /// Normal end of stream.
    Stop,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fatal => "fatal",
            Self::Retriable => "retriable",
            Self::Stop => "stop",
        })
    }
}

/// A classified connection or stream outcome, consumed once by the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ClassifiedError {
    pub fn fatal(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            detail: detail.into(),
        }
    }

    pub fn retriable(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Retriable,
            detail: detail.into(),
        }
    }

    pub fn stop() -> Self {
        Self {
            kind: ErrorKind::Stop,
            detail: String::new(),
        }
    }
}

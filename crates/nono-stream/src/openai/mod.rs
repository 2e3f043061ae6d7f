//! OpenAI chat-completions integration: configuration, request building,
//! event-stream decoding and the HTTP transport.
mod config;
pub(crate) mod request;
pub(crate) mod sse;
mod transport;
pub(crate) mod wire;

pub use config::ClientConfig;
pub use request::{RequestBuilder, RequestSpec};
pub use sse::{Frame, SseDecoder};
pub use transport::HttpTransport;
pub use wire::{ChatCompletionBody, ChatMessage, Role};

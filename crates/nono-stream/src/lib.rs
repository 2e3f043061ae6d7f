//! Resilient streaming completion client for an OpenAI-compatible
//! chat-completions endpoint.
//!
//! A query is sent as one streaming request; each delta reaches the caller
//! through `CompletionCallbacks` as it arrives. Transient failures reconnect
//! transparently, fatal ones surface once through `on_error`, and a session can
//! be cancelled at any time with no callbacks afterwards.
//!
//! Provider-specific wire details are namespaced under `openai::*`.
//!
//! # Usage
//!
//! ```no_run
//! use nono_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = CompletionClient::from_env()?;
//! let assistant = Assistant::new(client);
//!
//! let handle = assistant.translate(
//!     "Hello world",
//!     Callbacks::new(
//!         |text: &str, _is_first: bool| print!("{text}"),
//!         |_full: &str| println!(),
//!         |message: &str| eprintln!("error: {message}"),
//!     ),
//! )?;
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

/// Task adapters and their prompt templates.
pub mod assist;
/// Classification of stream observations into fatal/retriable/stop.
pub mod classify;
/// Client entry point and builder.
pub mod client;
/// Public error types.
pub mod errors;
/// OpenAI wire format, request building, event-stream decoding and HTTP transport.
pub mod openai;
/// Common imports for typical usage.
pub mod prelude;
/// Query model and task kinds.
pub mod query;
/// Reconnect backoff policy.
pub mod retry;
/// Session driver and cancellation handle.
pub mod session;
/// Switch-latest ownership of sessions per UI slot.
pub mod slot;
/// Frame interpretation, session states and the callback contract.
pub mod stream;
/// Transport contract and connection wrapper.
pub mod transport;

pub use assist::{Assistant, Languages, LeadingQuoteStrip};
pub use classify::{Observation, classify};
pub use client::{CompletionClient, CompletionClientBuilder};
pub use errors::{ClassifiedError, ClientError, ErrorKind, TransportError};
pub use openai::{ClientConfig, HttpTransport, RequestBuilder, RequestSpec};
pub use query::{Query, TaskKind};
pub use retry::RetryPolicy;
pub use session::{CompletionSession, SessionHandle};
pub use slot::{Slot, SlotRegistry};
pub use stream::{
    Callbacks, CompletionCallbacks, DeltaFilter, FrameOutcome, PassThrough, SessionState,
    interpret_frame,
};
pub use transport::{ByteStream, Connection, FrameStream, StreamTransport};

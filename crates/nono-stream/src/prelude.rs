//! Common imports for typical client usage.
pub use crate::{
    Assistant, Callbacks, ClientConfig, ClientError, CompletionCallbacks, CompletionClient,
    Languages, Query, RetryPolicy, SessionHandle, SessionState, Slot, SlotRegistry, TaskKind,
};

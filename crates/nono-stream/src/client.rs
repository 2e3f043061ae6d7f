use std::sync::Arc;
use std::time::Duration;

use crate::errors::ClientError;
use crate::openai::{ClientConfig, HttpTransport, RequestBuilder};
use crate::query::Query;
use crate::retry::RetryPolicy;
use crate::session::{CompletionSession, SessionHandle};
use crate::stream::{CompletionCallbacks, DeltaFilter, PassThrough};
use crate::transport::StreamTransport;

struct ClientInner {
    transport: Arc<dyn StreamTransport>,
    requests: RequestBuilder,
    retry: RetryPolicy,
    idle_timeout: Option<Duration>,
}

/// Entry point for opening completion sessions.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct CompletionClient {
    inner: Arc<ClientInner>,
}

impl CompletionClient {
    /// Creates a client over HTTP from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder(config).build()
    }

    /// Creates a client using `ClientConfig::from_env`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Starts a builder, mainly for swapping the transport.
    pub fn builder(config: ClientConfig) -> CompletionClientBuilder {
        CompletionClientBuilder {
            config,
            transport: None,
        }
    }

    /// Opens a session for `query` and returns immediately.
    ///
    /// Must be called within a Tokio runtime.
    pub fn open(&self, query: &Query, callbacks: impl CompletionCallbacks) -> SessionHandle {
        self.open_filtered(query, PassThrough, callbacks)
    }

    /// Like `open`, rewriting each delta through `filter` before it is
    /// surfaced and accumulated.
    pub fn open_filtered(
        &self,
        query: &Query,
        filter: impl DeltaFilter,
        callbacks: impl CompletionCallbacks,
    ) -> SessionHandle {
        self.session(query, Box::new(filter), Box::new(callbacks))
            .spawn()
    }

    /// Builds a session without starting it; drive it with
    /// `CompletionSession::run` or `CompletionSession::spawn`.
    pub fn session(
        &self,
        query: &Query,
        filter: Box<dyn DeltaFilter>,
        callbacks: Box<dyn CompletionCallbacks>,
    ) -> CompletionSession {
        let request = self.inner.requests.build(query);
        CompletionSession::new(
            self.inner.transport.clone(),
            request,
            self.inner.retry.clone(),
            filter,
            callbacks,
        )
        .with_idle_timeout(self.inner.idle_timeout)
    }
}

/// Builder for `CompletionClient`.
pub struct CompletionClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn StreamTransport>>,
}

impl CompletionClientBuilder {
    /// Replaces the default HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn StreamTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validates configuration and builds the client.
    pub fn build(self) -> Result<CompletionClient, ClientError> {
        self.config.validate()?;
        let requests = RequestBuilder::new(&self.config)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        Ok(CompletionClient {
            inner: Arc::new(ClientInner {
                transport,
                requests,
                retry: self.config.retry,
                idle_timeout: self.config.idle_timeout,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_blank_api_key() {
        let result = CompletionClient::new(ClientConfig::new(""));
        assert!(matches!(result, Err(ClientError::Config(msg)) if msg.contains("api_key")));
    }

    #[test]
    fn build_accepts_valid_config() {
        assert!(CompletionClient::new(ClientConfig::new("sk-test")).is_ok());
    }
}

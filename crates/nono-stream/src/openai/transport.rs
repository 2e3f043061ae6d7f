use futures::TryStreamExt as _;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::errors::{ClientError, TransportError};
use crate::transport::{ByteStream, Connection, StreamTransport};

use super::config::ClientConfig;
use super::request::RequestSpec;

/// `StreamTransport` over reqwest with a streaming response body.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport from client configuration.
    ///
    /// Only the connect phase is bounded; a healthy stream may stay open as
    /// long as the service keeps sending.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self, request: &RequestSpec) -> Result<Connection, TransportError> {
        debug!(endpoint = %request.endpoint, model = %request.body.model, "opening completion stream");
        let response = self
            .client
            .post(&request.endpoint)
            .headers(request.headers.clone())
            .json(&request.body)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("completion request failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map_err(|e| TransportError::new(format!("completion stream read failed: {e}"))),
        );
        Ok(Connection::new(status, content_type, body))
    }
}

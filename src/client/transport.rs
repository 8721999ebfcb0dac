//! Transport layer for agentkernel client communication.
//!
//! Provides the `Transport` trait that both client flavours are written
//! against, and `HttpTransport`, the reqwest implementation that performs the
//! envelope exchange and opens event streams.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::watch;

use crate::config::{self, ClientConfig};
use crate::error::{error_from_status, AgentKernelError, AgentKernelResult};

use super::envelope::unwrap_envelope;
use super::sse::EventStream;

/// Transport abstraction for agentkernel communication.
///
/// One request/response exchange per call. Implementations own the
/// connection pool and are shared between clones of a client and the
/// sessions it hands out.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request and return the envelope's `data` payload.
    ///
    /// Failure statuses map through [`error_from_status`]; a logically failed
    /// envelope maps to [`AgentKernelError::Api`]; connection failures and
    /// timeouts map to [`AgentKernelError::Network`]. The configured timeout
    /// bounds the whole exchange.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AgentKernelResult<Value>;

    /// Perform one request whose success response is an event stream.
    ///
    /// Errors opening the stream are returned before any event is produced.
    /// The configured timeout bounds connecting and each read, not the
    /// lifetime of the stream.
    async fn open_stream(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AgentKernelResult<EventStream>;

    /// Close the transport. Open streams end at their next poll and further
    /// requests fail with [`AgentKernelError::Network`].
    ///
    /// The default implementation is a no-op.
    async fn close(&self) -> AgentKernelResult<()> {
        Ok(())
    }
}

/// JSON-over-HTTP transport using `reqwest`.
///
/// # Example
///
/// ```no_run
/// use agentkernel_rs::client::HttpTransport;
/// use agentkernel_rs::config::ClientConfig;
///
/// let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
/// assert_eq!(transport.base_url(), "http://localhost:18888");
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Option<Duration>,
    closed: watch::Sender<bool>,
}

impl HttpTransport {
    /// Create a transport from resolved settings.
    ///
    /// Sends `User-Agent` on every request, plus `Authorization: Bearer <key>`
    /// when an API key is configured.
    pub fn new(config: &ClientConfig) -> AgentKernelResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(config::USER_AGENT));

        if let Some(key) = config.api_key.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| AgentKernelError::auth(format!("invalid API key: {e}")))?;
            default_headers.insert(AUTHORIZATION, value);
        }

        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                AgentKernelError::validation(format!("invalid header name '{key}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                AgentKernelError::validation(format!("invalid value for header '{key}': {e}"))
            })?;
            default_headers.insert(name, value);
        }

        // Only connecting and idle reads are bounded here. `execute` adds the
        // whole-request deadline per call.
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| AgentKernelError::Network(format!("failed to build HTTP client: {e}")))?;

        let mut transport = Self::with_client(&config.base_url, client);
        transport.request_timeout = Some(config.timeout);
        Ok(transport)
    }

    /// Create a transport with an existing `reqwest::Client`.
    ///
    /// Useful when you want to share a connection pool or configure TLS
    /// settings externally. No default headers or timeouts are added.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let (closed, _) = watch::channel(false);
        Self {
            client,
            base_url,
            request_timeout: None,
            closed,
        }
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether [`Transport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn ensure_open(&self) -> AgentKernelResult<()> {
        if self.is_closed() {
            return Err(AgentKernelError::Network("client is closed".to_string()));
        }
        Ok(())
    }

    /// Resolves once the transport is closed; never resolves otherwise.
    fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut closed = self.closed.subscribe();
        async move {
            let signalled = closed.wait_for(|closed| *closed).await.is_ok();
            if !signalled {
                std::future::pending::<()>().await;
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        accept: &'static str,
        deadline: Option<Duration>,
    ) -> AgentKernelResult<reqwest::Response> {
        self.ensure_open()?;

        let url = self.url(path);
        tracing::debug!(%method, %url, "sending request");

        let mut request = self
            .client
            .request(method, &url)
            .header(ACCEPT, HeaderValue::from_static(accept));
        if let Some(body) = body {
            request = request.json(&body);
        }
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AgentKernelResult<Value> {
        let response = self
            .send(method, path, body, "application/json", self.request_timeout)
            .await?;

        let status = response.status().as_u16();
        tracing::debug!(status, path, "received response");

        // The status decides the kind of a failure even when its body is lost.
        let text = if status >= 400 {
            response.text().await.unwrap_or_default()
        } else {
            response.text().await.map_err(|e| {
                AgentKernelError::Network(format!("failed to read response body: {e}"))
            })?
        };

        unwrap_envelope(status, &text)
    }

    async fn open_stream(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AgentKernelResult<EventStream> {
        let response = self
            .send(method, path, body, "text/event-stream", None)
            .await?;

        let status = response.status().as_u16();
        if status >= 400 {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_status(status, &text));
        }

        // A JSON body on a success status is an envelope, not a stream.
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let text = response.text().await.map_err(|e| {
                AgentKernelError::Network(format!("failed to read response body: {e}"))
            })?;
            unwrap_envelope(status, &text)?;
            return Err(AgentKernelError::Api(
                "expected an event stream, got a JSON response".to_string(),
            ));
        }

        tracing::debug!(status, path, "event stream opened");
        Ok(EventStream::new(response.bytes_stream()).with_shutdown(self.shutdown_signal()))
    }

    async fn close(&self) -> AgentKernelResult<()> {
        if !self.closed.send_replace(true) {
            tracing::debug!(base_url = %self.base_url, "transport closed");
        }
        Ok(())
    }
}

//! Builder for ergonomic construction of agentkernel clients.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::AgentKernelClient;
use crate::config::ClientConfig;
use crate::error::AgentKernelResult;

/// Builder for an [`AgentKernelClient`].
///
/// Settings not given here fall back to the `AGENTKERNEL_*` environment
/// variables, then to the built-in defaults.
///
/// # Example
///
/// ```no_run
/// # fn example() -> agentkernel_rs::AgentKernelResult<()> {
/// use agentkernel_rs::builders::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .with_base_url("http://localhost:18888")
///     .with_timeout(Duration::from_secs(120))
///     .with_header("X-Request-Source", "ci")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    headers: HashMap<String, String>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .finish()
    }
}

impl ClientBuilder {
    /// Create a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the API key sent as a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a custom HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Resolve the final settings against the environment and defaults.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::resolve(
            self.base_url.as_deref(),
            self.api_key.as_deref(),
            self.timeout,
        );
        config.headers.extend(self.headers.clone());
        config
    }

    /// Build an async client.
    pub fn build(self) -> AgentKernelResult<AgentKernelClient> {
        AgentKernelClient::from_config(self.config())
    }

    /// Build a blocking client.
    #[cfg(feature = "blocking")]
    pub fn build_blocking(self) -> AgentKernelResult<crate::blocking::AgentKernelClient> {
        crate::blocking::AgentKernelClient::from_config(self.config())
    }
}

//! Connection settings for the agentkernel client.
//!
//! Settings resolve with precedence explicit argument > environment variable >
//! built-in default.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the service base URL.
pub const ENV_BASE_URL: &str = "AGENTKERNEL_BASE_URL";

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "AGENTKERNEL_API_KEY";

/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT: &str = "AGENTKERNEL_TIMEOUT";

/// Base URL used when neither an argument nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:18888";

/// Request timeout used when neither an argument nor the environment provides one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("agentkernel-rs/", env!("CARGO_PKG_VERSION"));

/// Resolved connection settings.
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    /// Sent as `Authorization: Bearer <key>` when set.
    pub api_key: Option<String>,
    /// Deadline for each non-streaming request. Event streams use it for
    /// connecting and for each idle gap between chunks instead, so a stream
    /// that keeps producing events is never cut off.
    pub timeout: Duration,
    /// Additional headers sent with every request.
    pub headers: HashMap<String, String>,
}

impl ClientConfig {
    /// Resolve settings from explicit values, falling back to the environment
    /// and then to the built-in defaults.
    pub fn resolve(
        base_url: Option<&str>,
        api_key: Option<&str>,
        timeout: Option<Duration>,
    ) -> Self {
        Self::resolve_with(|key| std::env::var(key).ok(), base_url, api_key, timeout)
    }

    /// Settings from the environment only.
    pub fn from_env() -> Self {
        Self::resolve(None, None, None)
    }

    fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        base_url: Option<&str>,
        api_key: Option<&str>,
        timeout: Option<Duration>,
    ) -> Self {
        // Empty strings count as unset at every level.
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let base_url = non_empty(base_url.map(String::from))
            .or_else(|| non_empty(lookup(ENV_BASE_URL)))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let api_key =
            non_empty(api_key.map(String::from)).or_else(|| non_empty(lookup(ENV_API_KEY)));

        let timeout = timeout
            .or_else(|| non_empty(lookup(ENV_TIMEOUT)).and_then(|raw| parse_timeout(&raw)))
            .unwrap_or(DEFAULT_TIMEOUT);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            headers: HashMap::new(),
        }
    }
}

impl Default for ClientConfig {
    /// Built-in defaults, ignoring the environment.
    fn default() -> Self {
        Self::resolve_with(|_| None, None, None, None)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn parse_timeout(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs > 0.0 && secs < f64::from(u32::MAX) => {
            Some(Duration::from_secs_f64(secs))
        }
        _ => {
            tracing::warn!("ignoring invalid {}={:?}", ENV_TIMEOUT, raw);
            None
        }
    }
}

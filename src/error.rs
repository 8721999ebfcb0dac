//! agentkernel error types — HTTP status mapping + client-side failures.
//!
//! Every failure the SDK can report is one variant of [`AgentKernelError`]:
//! - Status-derived errors (`400`, `401`, `404`, any other `>= 400`)
//! - Transport errors raised before a response arrives
//! - Streaming errors raised while reading an event-stream body
//! - A generic [`AgentKernelError::Api`] kind for logical failures

// ---------------------------------------------------------------------------
// HTTP status codes with a dedicated error kind
// ---------------------------------------------------------------------------

/// Malformed request.
pub const STATUS_VALIDATION: u16 = 400;

/// Missing or rejected credential.
pub const STATUS_AUTH: u16 = 401;

/// Unknown sandbox, file, or route.
pub const STATUS_NOT_FOUND: u16 = 404;

// ---------------------------------------------------------------------------
// AgentKernelError enum
// ---------------------------------------------------------------------------

/// Unified error type for all agentkernel SDK operations.
///
/// Callers that only care about the broad category can match on
/// [`AgentKernelError::kind()`]; callers that want the message or status can
/// match the variant directly.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentKernelError {
    // -- Status-derived errors --
    /// Request rejected as malformed (HTTP 400).
    #[error("validation error: {message}")]
    Validation {
        /// Message from the error body, or the raw body.
        message: String,
    },

    /// Credential missing or rejected (HTTP 401).
    #[error("authentication error: {message}")]
    Auth {
        /// Message from the error body, or the raw body.
        message: String,
    },

    /// Resource does not exist (HTTP 404).
    #[error("not found: {message}")]
    NotFound {
        /// Message from the error body, or the raw body.
        message: String,
    },

    /// Any other HTTP failure status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, or the raw body.
        message: String,
    },

    // -- Client-side errors --
    /// The exchange could not complete: connection refused, timeout, or the
    /// client was closed.
    #[error("network error: {0}")]
    Network(String),

    /// The event-stream body could not be read to its end.
    #[error("stream error: {0}")]
    Stream(String),

    /// Logical failure reported by the service on a success status, or a
    /// response that could not be decoded into the expected shape.
    #[error("{0}")]
    Api(String),
}

/// Convenience result type for agentkernel operations.
pub type AgentKernelResult<T> = Result<T, AgentKernelError>;

/// Broad category of an [`AgentKernelError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    Server,
    Network,
    Stream,
    Api,
}

impl AgentKernelError {
    // -- Convenience constructors --

    /// Create a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an `Auth` error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a `Server` error for the given status.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Returns the broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentKernelError::Validation { .. } => ErrorKind::Validation,
            AgentKernelError::Auth { .. } => ErrorKind::Auth,
            AgentKernelError::NotFound { .. } => ErrorKind::NotFound,
            AgentKernelError::Server { .. } => ErrorKind::Server,
            AgentKernelError::Network(_) => ErrorKind::Network,
            AgentKernelError::Stream(_) => ErrorKind::Stream,
            AgentKernelError::Api(_) => ErrorKind::Api,
        }
    }

    /// Returns the HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentKernelError::Validation { .. } => Some(STATUS_VALIDATION),
            AgentKernelError::Auth { .. } => Some(STATUS_AUTH),
            AgentKernelError::NotFound { .. } => Some(STATUS_NOT_FOUND),
            AgentKernelError::Server { status, .. } => Some(*status),
            AgentKernelError::Network(_)
            | AgentKernelError::Stream(_)
            | AgentKernelError::Api(_) => None,
        }
    }

    /// Returns the bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            AgentKernelError::Validation { message }
            | AgentKernelError::Auth { message }
            | AgentKernelError::NotFound { message }
            | AgentKernelError::Server { message, .. } => message,
            AgentKernelError::Network(message)
            | AgentKernelError::Stream(message)
            | AgentKernelError::Api(message) => message,
        }
    }
}

/// Map an HTTP failure status and its raw body to an error.
///
/// The body is parsed as JSON; a string `error` (or `message`) field becomes
/// the error message. Anything else, including an unparseable body, falls
/// back to the raw body text so the status-derived kind is never lost.
pub fn error_from_status(status: u16, body: &str) -> AgentKernelError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(|field| field.as_str())
                    .map(String::from)
            })
        })
        .unwrap_or_else(|| body.to_string());

    match status {
        STATUS_VALIDATION => AgentKernelError::Validation { message },
        STATUS_AUTH => AgentKernelError::Auth { message },
        STATUS_NOT_FOUND => AgentKernelError::NotFound { message },
        _ => AgentKernelError::Server { status, message },
    }
}

impl From<reqwest::Error> for AgentKernelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentKernelError::Network(format!("request timed out: {err}"))
        } else if err.is_connect() {
            AgentKernelError::Network(format!("failed to connect: {err}"))
        } else if err.is_decode() {
            AgentKernelError::Api(format!("failed to decode response body: {err}"))
        } else {
            AgentKernelError::Network(format!("HTTP request failed: {err}"))
        }
    }
}

impl From<serde_json::Error> for AgentKernelError {
    fn from(err: serde_json::Error) -> Self {
        AgentKernelError::Api(format!("invalid JSON: {err}"))
    }
}

//! Envelope unwrapping for non-streaming responses.
//!
//! Every non-streaming response body is `{success, data, error}`. Failure
//! statuses are classified before the body is treated as an envelope, since
//! error bodies are not guaranteed to be well-formed envelopes.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{error_from_status, AgentKernelError, AgentKernelResult};
use crate::types::Envelope;

/// Turn a received status + body into the envelope's `data` payload.
///
/// - `status >= 400`: status-derived error (see [`error_from_status`]).
/// - `success: false`: [`AgentKernelError::Api`] with the envelope's `error`.
/// - otherwise: `data` verbatim (`null` when absent).
pub(crate) fn unwrap_envelope(status: u16, body: &str) -> AgentKernelResult<Value> {
    if status >= 400 {
        return Err(error_from_status(status, body));
    }

    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        AgentKernelError::Api(format!("failed to parse response envelope: {e}"))
    })?;

    if !envelope.success {
        return Err(AgentKernelError::Api(
            envelope
                .error
                .unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }

    Ok(envelope.data.unwrap_or(Value::Null))
}

/// Deserialize an untyped envelope payload into the expected type.
pub(crate) fn decode_payload<T: DeserializeOwned>(data: Value) -> AgentKernelResult<T> {
    serde_json::from_value(data)
        .map_err(|e| AgentKernelError::Api(format!("unexpected response payload: {e}")))
}

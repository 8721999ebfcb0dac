//! agentkernel wire types — sandbox descriptors, command results, stream
//! events, and the request bodies sent to the HTTP API.
//!
//! Field names follow the service's JSON exactly (`snake_case`); optional
//! request fields are omitted rather than sent as `null`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AgentKernelError, AgentKernelResult};

// ============================================================================
// Enums
// ============================================================================

/// Server-side isolation strictness for a sandbox or one-shot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProfile {
    /// Network and filesystem access largely unrestricted.
    Permissive,
    /// Default profile.
    Moderate,
    /// No network, read-only root filesystem.
    Restrictive,
}

impl SecurityProfile {
    /// The wire name of this profile.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProfile::Permissive => "permissive",
            SecurityProfile::Moderate => "moderate",
            SecurityProfile::Restrictive => "restrictive",
        }
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SecurityProfile {
    type Err = AgentKernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(SecurityProfile::Permissive),
            "moderate" => Ok(SecurityProfile::Moderate),
            "restrictive" => Ok(SecurityProfile::Restrictive),
            other => Err(AgentKernelError::validation(format!(
                "unknown security profile '{other}'"
            ))),
        }
    }
}

/// Lifecycle state of a sandbox as last reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Running,
    Stopped,
    /// A state this SDK version does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SandboxStatus::Running => "running",
            SandboxStatus::Stopped => "stopped",
            SandboxStatus::Unknown => "unknown",
        };
        f.pad(s)
    }
}

/// The kind of a [`StreamEvent`].
///
/// Only these five names are surfaced; frames with any other event name are
/// skipped by the stream parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventType {
    /// The command has been accepted and the sandbox is starting.
    Started,
    /// Provisioning progress.
    Progress,
    /// Incremental command output under the `data` key.
    Output,
    /// The command finished; exit code under the `exit_code` key.
    Done,
    /// The run failed; message under the `message` key.
    Error,
}

impl StreamEventType {
    /// Parse an event-stream event name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "started" => Some(StreamEventType::Started),
            "progress" => Some(StreamEventType::Progress),
            "output" => Some(StreamEventType::Output),
            "done" => Some(StreamEventType::Done),
            "error" => Some(StreamEventType::Error),
            _ => None,
        }
    }

    /// The event name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventType::Started => "started",
            StreamEventType::Progress => "progress",
            StreamEventType::Output => "output",
            StreamEventType::Done => "done",
            StreamEventType::Error => "error",
        }
    }

    /// `done` and `error` end a stream; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEventType::Done | StreamEventType::Error)
    }
}

impl fmt::Display for StreamEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Content encoding of a file body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileEncoding {
    #[default]
    #[serde(rename = "utf8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

// ============================================================================
// Envelope
// ============================================================================

/// The `{success, data, error}` wrapper around every non-streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    /// Payload, meaningful only when `success` is true.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Failure message, meaningful only when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Captured stdout/stderr of a completed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub output: String,
}

/// Server-side description of a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub name: String,
    pub status: SandboxStatus,
    /// Execution backend, e.g. `docker` or `firecracker`.
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// RFC 3339 creation time as sent by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl SandboxInfo {
    pub fn is_running(&self) -> bool {
        self.status == SandboxStatus::Running
    }

    /// `created_at` parsed as a UTC timestamp. `None` if absent or not RFC 3339.
    pub fn created_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let raw = self.created_at.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&chrono::Utc))
    }
}

/// One decoded unit of a live output stream.
///
/// The shape of `data` depends on `event_type`: `output` carries text under
/// `data`, `done` an exit code under `exit_code`, `error` a message under
/// `message`. Frames whose payload was not a JSON object carry the raw text
/// under `raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl StreamEvent {
    pub fn new(
        event_type: StreamEventType,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self { event_type, data }
    }

    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }

    /// Incremental output text of an `output` event.
    pub fn output(&self) -> Option<&str> {
        match self.event_type {
            StreamEventType::Output => self.data.get("data").and_then(|v| v.as_str()),
            _ => None,
        }
    }

    /// Exit code of a `done` event.
    pub fn exit_code(&self) -> Option<i64> {
        match self.event_type {
            StreamEventType::Done => self.data.get("exit_code").and_then(|v| v.as_i64()),
            _ => None,
        }
    }

    /// Failure message of an `error` event.
    pub fn message(&self) -> Option<&str> {
        match self.event_type {
            StreamEventType::Error => self.data.get("message").and_then(|v| v.as_str()),
            _ => None,
        }
    }

    /// Undecodable payload text, if the frame data was not a JSON object.
    pub fn raw(&self) -> Option<&str> {
        self.data.get("raw").and_then(|v| v.as_str())
    }
}

/// Result of draining a stream with
/// [`EventStream::collect_output()`](crate::client::EventStream::collect_output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutput {
    /// Concatenated text of every `output` event, in order.
    pub output: String,
    /// Exit code carried by the `done` event, if the server sent one.
    pub exit_code: Option<i64>,
}

/// Response from reading a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadResponse {
    pub content: String,
    pub encoding: String,
    pub size: usize,
}

/// A command for batch execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCommand {
    pub command: Vec<String>,
}

impl BatchCommand {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outcome of a single batch command: output or error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchResult {
    /// Convert into a per-item result. An `error` wins over `output`.
    pub fn into_result(self) -> AgentKernelResult<RunOutput> {
        match (self.error, self.output) {
            (Some(error), _) => Err(AgentKernelError::Api(error)),
            (None, Some(output)) => Ok(RunOutput { output }),
            (None, None) => Ok(RunOutput {
                output: String::new(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Response from batch execution; `results` preserves submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRunResponse {
    pub results: Vec<BatchResult>,
}

// ============================================================================
// Options
// ============================================================================

/// Options for a one-shot run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub image: Option<String>,
    pub profile: Option<SecurityProfile>,
    /// Ask the server to skip full environment provisioning. Defaults to `true`.
    pub fast: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            image: None,
            profile: None,
            fast: true,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_profile(mut self, profile: SecurityProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }
}

/// Options for creating a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSandboxOptions {
    pub image: Option<String>,
    pub vcpus: Option<u32>,
    pub memory_mb: Option<u64>,
    pub profile: Option<SecurityProfile>,
}

impl CreateSandboxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_vcpus(mut self, vcpus: u32) -> Self {
        self.vcpus = Some(vcpus);
        self
    }

    pub fn with_memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    pub fn with_profile(mut self, profile: SecurityProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

// ============================================================================
// Request bodies (internal)
// ============================================================================

/// `POST /run` and `POST /run/stream` body.
#[derive(Debug, Serialize)]
pub(crate) struct RunRequest {
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SecurityProfile>,
    pub fast: bool,
}

impl RunRequest {
    pub fn new(command: Vec<String>, options: RunOptions) -> Self {
        Self {
            command,
            image: options.image,
            profile: options.profile,
            fast: options.fast,
        }
    }
}

/// `POST /sandboxes` body.
#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SecurityProfile>,
}

impl CreateRequest {
    pub fn new(name: &str, options: CreateSandboxOptions) -> Self {
        Self {
            name: name.to_string(),
            image: options.image,
            vcpus: options.vcpus,
            memory_mb: options.memory_mb,
            profile: options.profile,
        }
    }
}

/// `POST /sandboxes/{name}/exec` body.
#[derive(Debug, Serialize)]
pub(crate) struct ExecRequest {
    pub command: Vec<String>,
}

/// `PUT /sandboxes/{name}/files/{path}` body.
#[derive(Debug, Serialize)]
pub(crate) struct FileWriteRequest {
    pub content: String,
    pub encoding: FileEncoding,
}

/// `POST /batch/run` body.
#[derive(Debug, Serialize)]
pub(crate) struct BatchRunRequest {
    pub commands: Vec<BatchCommand>,
}

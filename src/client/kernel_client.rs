//! High-level agentkernel client.
//!
//! Typed methods for every endpoint of the agentkernel HTTP API, written once
//! against [`Transport`]. The blocking client drives these same methods.

use std::future::Future;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::builders::ClientBuilder;
use crate::config::ClientConfig;
use crate::error::{AgentKernelError, AgentKernelResult};
use crate::types::{
    BatchCommand, BatchRunRequest, BatchRunResponse, CreateRequest, CreateSandboxOptions,
    ExecRequest, FileEncoding, FileReadResponse, FileWriteRequest, RunOptions, RunOutput,
    RunRequest, SandboxInfo,
};

use super::envelope::decode_payload;
use super::session::SandboxSession;
use super::sse::EventStream;
use super::transport::{HttpTransport, Transport};

/// Client for the agentkernel HTTP API.
///
/// Cloning is cheap: clones share one transport and connection pool.
///
/// # Construction
///
/// ```no_run
/// use agentkernel_rs::client::AgentKernelClient;
/// use std::time::Duration;
///
/// # fn example() -> agentkernel_rs::AgentKernelResult<()> {
/// // Settings from AGENTKERNEL_* environment variables or defaults:
/// let client = AgentKernelClient::new()?;
///
/// // Explicit settings:
/// let client = AgentKernelClient::builder()
///     .with_base_url("http://kernel.internal:18888")
///     .with_api_key("sk-test")
///     .with_timeout(Duration::from_secs(60))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AgentKernelClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for AgentKernelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentKernelClient").finish_non_exhaustive()
    }
}

impl AgentKernelClient {
    /// Create a client from environment settings, falling back to defaults.
    pub fn new() -> AgentKernelResult<Self> {
        Self::from_config(ClientConfig::from_env())
    }

    /// Create a client from resolved settings.
    pub fn from_config(config: ClientConfig) -> AgentKernelResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    // ──────────────────────────────────────────────────
    // One-shot execution
    // ──────────────────────────────────────────────────

    /// Health check (`GET /health`). Returns `"ok"`.
    pub async fn health(&self) -> AgentKernelResult<String> {
        self.call(Method::GET, "/health", None).await
    }

    /// Run a command in an ephemeral sandbox (`POST /run`).
    pub async fn run<I, S>(
        &self,
        command: I,
        options: Option<RunOptions>,
    ) -> AgentKernelResult<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let body = RunRequest::new(to_command(command), options.unwrap_or_default());
        self.call(Method::POST, "/run", Some(to_body(&body)?)).await
    }

    /// Run a command and stream its events (`POST /run/stream`).
    ///
    /// Failures opening the stream are returned here as typed errors. A
    /// failure reported by the server mid-run arrives as an `error` event.
    pub async fn run_stream<I, S>(
        &self,
        command: I,
        options: Option<RunOptions>,
    ) -> AgentKernelResult<EventStream>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let body = RunRequest::new(to_command(command), options.unwrap_or_default());
        self.transport
            .open_stream(Method::POST, "/run/stream", Some(to_body(&body)?))
            .await
    }

    // ──────────────────────────────────────────────────
    // Sandbox lifecycle
    // ──────────────────────────────────────────────────

    /// List all sandboxes (`GET /sandboxes`).
    pub async fn list_sandboxes(&self) -> AgentKernelResult<Vec<SandboxInfo>> {
        self.call(Method::GET, "/sandboxes", None).await
    }

    /// Create a sandbox (`POST /sandboxes`). The name must be unique among
    /// active sandboxes.
    pub async fn create_sandbox(
        &self,
        name: &str,
        options: Option<CreateSandboxOptions>,
    ) -> AgentKernelResult<SandboxInfo> {
        let body = CreateRequest::new(name, options.unwrap_or_default());
        self.call(Method::POST, "/sandboxes", Some(to_body(&body)?))
            .await
    }

    /// Get a sandbox descriptor (`GET /sandboxes/{name}`).
    pub async fn get_sandbox(&self, name: &str) -> AgentKernelResult<SandboxInfo> {
        self.call(Method::GET, &sandbox_path(name), None).await
    }

    /// Remove a sandbox (`DELETE /sandboxes/{name}`).
    pub async fn remove_sandbox(&self, name: &str) -> AgentKernelResult<()> {
        let _: Value = self.call(Method::DELETE, &sandbox_path(name), None).await?;
        Ok(())
    }

    /// Run a command in an existing sandbox (`POST /sandboxes/{name}/exec`).
    pub async fn exec_in_sandbox<I, S>(&self, name: &str, command: I) -> AgentKernelResult<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let body = ExecRequest {
            command: to_command(command),
        };
        let path = format!("{}/exec", sandbox_path(name));
        self.call(Method::POST, &path, Some(to_body(&body)?)).await
    }

    /// Create a sandbox and return a session bound to it.
    ///
    /// The session removes the sandbox at most once; see [`SandboxSession`].
    pub async fn sandbox(
        &self,
        name: &str,
        options: Option<CreateSandboxOptions>,
    ) -> AgentKernelResult<SandboxSession> {
        self.create_sandbox(name, options).await?;
        tracing::debug!(sandbox = %name, "sandbox session started");
        Ok(SandboxSession::new(name, self.clone()))
    }

    /// Create a sandbox, run `f` with a session for it, then remove it.
    ///
    /// Removal is awaited whether `f` succeeds or fails; an error from `f`
    /// takes precedence over a removal error. If `f` panics or this future is
    /// dropped, removal is spawned on the current runtime instead.
    ///
    /// ```no_run
    /// # async fn example(client: agentkernel_rs::client::AgentKernelClient) -> agentkernel_rs::AgentKernelResult<()> {
    /// let output = client
    ///     .with_sandbox("scratch", None, |sb| async move {
    ///         sb.run(["pip", "install", "numpy"]).await?;
    ///         sb.run(["python3", "-c", "import numpy; print(numpy.__version__)"]).await
    ///     })
    ///     .await?;
    /// println!("{}", output.output);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_sandbox<F, Fut, T>(
        &self,
        name: &str,
        options: Option<CreateSandboxOptions>,
        f: F,
    ) -> AgentKernelResult<T>
    where
        F: FnOnce(SandboxSession) -> Fut,
        Fut: Future<Output = AgentKernelResult<T>>,
    {
        let session = self.sandbox(name, options).await?;
        let result = f(session.lend()).await;
        let removal = session.remove().await;
        match (result, removal) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    // ──────────────────────────────────────────────────
    // Files and logs
    // ──────────────────────────────────────────────────

    /// Read a file from a sandbox (`GET /sandboxes/{name}/files/{path}`).
    pub async fn read_file(&self, name: &str, path: &str) -> AgentKernelResult<FileReadResponse> {
        self.call(Method::GET, &file_path(name, path), None).await
    }

    /// Write a file to a sandbox (`PUT /sandboxes/{name}/files/{path}`).
    pub async fn write_file(
        &self,
        name: &str,
        path: &str,
        content: &str,
        encoding: FileEncoding,
    ) -> AgentKernelResult<String> {
        let body = FileWriteRequest {
            content: content.to_string(),
            encoding,
        };
        self.call(Method::PUT, &file_path(name, path), Some(to_body(&body)?))
            .await
    }

    /// Delete a file from a sandbox (`DELETE /sandboxes/{name}/files/{path}`).
    pub async fn delete_file(&self, name: &str, path: &str) -> AgentKernelResult<String> {
        self.call(Method::DELETE, &file_path(name, path), None).await
    }

    /// Audit log entries for a sandbox (`GET /sandboxes/{name}/logs`).
    pub async fn get_sandbox_logs(&self, name: &str) -> AgentKernelResult<Vec<Value>> {
        let path = format!("{}/logs", sandbox_path(name));
        self.call(Method::GET, &path, None).await
    }

    // ──────────────────────────────────────────────────
    // Batch
    // ──────────────────────────────────────────────────

    /// Run independent commands in parallel (`POST /batch/run`).
    ///
    /// Results come back in submission order; a failing command is reported
    /// in its own [`BatchResult`](crate::types::BatchResult) rather than
    /// failing the call.
    pub async fn batch_run<I>(&self, commands: I) -> AgentKernelResult<BatchRunResponse>
    where
        I: IntoIterator<Item = BatchCommand>,
    {
        let body = BatchRunRequest {
            commands: commands.into_iter().collect(),
        };
        let expected = body.commands.len();
        let response: BatchRunResponse = self
            .call(Method::POST, "/batch/run", Some(to_body(&body)?))
            .await?;
        if response.results.len() != expected {
            tracing::warn!(
                expected,
                received = response.results.len(),
                "batch result count does not match submitted commands"
            );
        }
        Ok(response)
    }

    /// Close the client. Open event streams end at their next poll and
    /// further calls fail with a network error.
    pub async fn close(&self) -> AgentKernelResult<()> {
        self.transport.close().await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AgentKernelResult<T> {
        let data = self.transport.execute(method, path, body).await?;
        decode_payload(data)
    }
}

// ──────────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────────

fn to_body(body: &impl Serialize) -> AgentKernelResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| AgentKernelError::Api(format!("failed to serialize request body: {e}")))
}

fn to_command<I, S>(command: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    command.into_iter().map(Into::into).collect()
}

fn sandbox_path(name: &str) -> String {
    format!("/sandboxes/{name}")
}

fn file_path(name: &str, path: &str) -> String {
    format!("{}/files/{}", sandbox_path(name), path.trim_start_matches('/'))
}

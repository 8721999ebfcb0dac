//! A blocking agentkernel client.
//!
//! Every method drives the async [`crate::client::AgentKernelClient`] to
//! completion on a private current-thread runtime, so both flavours speak the
//! same protocol with the same validation. Do not call these methods from
//! inside an async runtime; they return an error there instead of blocking
//! the executor.
//!
//! ```no_run
//! use agentkernel_rs::blocking::AgentKernelClient;
//!
//! # fn example() -> agentkernel_rs::AgentKernelResult<()> {
//! let client = AgentKernelClient::new()?;
//! let out = client.run(["echo", "hello"], None)?;
//! print!("{}", out.output);
//!
//! for event in client.run_stream(["ls", "-la"], None)? {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::{Handle, Runtime};

use crate::builders::ClientBuilder;
use crate::client::{self, EventStream, Termination, Transport};
use crate::config::ClientConfig;
use crate::error::{AgentKernelError, AgentKernelResult};
use crate::types::{
    BatchCommand, BatchRunResponse, CreateSandboxOptions, FileEncoding, FileReadResponse,
    RunOptions, RunOutput, SandboxInfo, StreamEvent, StreamOutput,
};

fn block_on<F, T>(runtime: &Runtime, future: F) -> AgentKernelResult<T>
where
    F: Future<Output = AgentKernelResult<T>>,
{
    if Handle::try_current().is_ok() {
        return Err(AgentKernelError::Api(
            "blocking client called from within an async runtime; use the async client instead"
                .to_string(),
        ));
    }
    runtime.block_on(future)
}

/// Blocking client for the agentkernel HTTP API.
///
/// Cloning is cheap: clones share one runtime and connection pool.
#[derive(Clone)]
pub struct AgentKernelClient {
    inner: client::AgentKernelClient,
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for AgentKernelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::AgentKernelClient")
            .finish_non_exhaustive()
    }
}

impl AgentKernelClient {
    /// Create a client from environment settings, falling back to defaults.
    pub fn new() -> AgentKernelResult<Self> {
        Self::from_config(ClientConfig::from_env())
    }

    /// Create a client from resolved settings.
    pub fn from_config(config: ClientConfig) -> AgentKernelResult<Self> {
        Ok(Self {
            inner: client::AgentKernelClient::from_config(config)?,
            runtime: Arc::new(new_runtime()?),
        })
    }

    /// Create a client with a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> AgentKernelResult<Self> {
        Ok(Self {
            inner: client::AgentKernelClient::with_transport(transport),
            runtime: Arc::new(new_runtime()?),
        })
    }

    /// Start building a client; finish with
    /// [`ClientBuilder::build_blocking`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Health check. Returns `"ok"`.
    pub fn health(&self) -> AgentKernelResult<String> {
        self.block_on(self.inner.health())
    }

    /// Run a command in an ephemeral sandbox.
    pub fn run<I, S>(&self, command: I, options: Option<RunOptions>) -> AgentKernelResult<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_on(self.inner.run(command, options))
    }

    /// Run a command and iterate over its events.
    pub fn run_stream<I, S>(
        &self,
        command: I,
        options: Option<RunOptions>,
    ) -> AgentKernelResult<EventIter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stream = self.block_on(self.inner.run_stream(command, options))?;
        Ok(EventIter {
            stream,
            runtime: Arc::clone(&self.runtime),
        })
    }

    /// List all sandboxes.
    pub fn list_sandboxes(&self) -> AgentKernelResult<Vec<SandboxInfo>> {
        self.block_on(self.inner.list_sandboxes())
    }

    /// Create a sandbox.
    pub fn create_sandbox(
        &self,
        name: &str,
        options: Option<CreateSandboxOptions>,
    ) -> AgentKernelResult<SandboxInfo> {
        self.block_on(self.inner.create_sandbox(name, options))
    }

    /// Get a sandbox descriptor.
    pub fn get_sandbox(&self, name: &str) -> AgentKernelResult<SandboxInfo> {
        self.block_on(self.inner.get_sandbox(name))
    }

    /// Remove a sandbox.
    pub fn remove_sandbox(&self, name: &str) -> AgentKernelResult<()> {
        self.block_on(self.inner.remove_sandbox(name))
    }

    /// Run a command in an existing sandbox.
    pub fn exec_in_sandbox<I, S>(&self, name: &str, command: I) -> AgentKernelResult<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_on(self.inner.exec_in_sandbox(name, command))
    }

    /// Read a file from a sandbox.
    pub fn read_file(&self, name: &str, path: &str) -> AgentKernelResult<FileReadResponse> {
        self.block_on(self.inner.read_file(name, path))
    }

    /// Write a file to a sandbox.
    pub fn write_file(
        &self,
        name: &str,
        path: &str,
        content: &str,
        encoding: FileEncoding,
    ) -> AgentKernelResult<String> {
        self.block_on(self.inner.write_file(name, path, content, encoding))
    }

    /// Delete a file from a sandbox.
    pub fn delete_file(&self, name: &str, path: &str) -> AgentKernelResult<String> {
        self.block_on(self.inner.delete_file(name, path))
    }

    /// Audit log entries for a sandbox.
    pub fn get_sandbox_logs(&self, name: &str) -> AgentKernelResult<Vec<Value>> {
        self.block_on(self.inner.get_sandbox_logs(name))
    }

    /// Run independent commands in parallel; results keep submission order.
    pub fn batch_run<I>(&self, commands: I) -> AgentKernelResult<BatchRunResponse>
    where
        I: IntoIterator<Item = BatchCommand>,
    {
        self.block_on(self.inner.batch_run(commands))
    }

    /// Create a sandbox and return a session bound to it. Dropping the
    /// session removes the sandbox if it has not been removed already.
    pub fn sandbox(
        &self,
        name: &str,
        options: Option<CreateSandboxOptions>,
    ) -> AgentKernelResult<SandboxSession> {
        let inner = self.block_on(self.inner.sandbox(name, options))?;
        Ok(SandboxSession {
            inner: inner.disarm(),
            runtime: Arc::clone(&self.runtime),
        })
    }

    /// Create a sandbox, run `f` with a session for it, then remove it.
    ///
    /// Removal happens whether `f` succeeds, fails or panics. An error from
    /// `f` takes precedence over a removal error.
    pub fn with_sandbox<F, T>(
        &self,
        name: &str,
        options: Option<CreateSandboxOptions>,
        f: F,
    ) -> AgentKernelResult<T>
    where
        F: FnOnce(&SandboxSession) -> AgentKernelResult<T>,
    {
        let session = self.sandbox(name, options)?;
        let result = f(&session);
        let removal = session.remove();
        match (result, removal) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    /// Close the client. Further calls fail with a network error.
    pub fn close(&self) -> AgentKernelResult<()> {
        self.block_on(self.inner.close())
    }

    fn block_on<F, T>(&self, future: F) -> AgentKernelResult<T>
    where
        F: Future<Output = AgentKernelResult<T>>,
    {
        block_on(&self.runtime, future)
    }
}

fn new_runtime() -> AgentKernelResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AgentKernelError::Network(format!("failed to start runtime: {e}")))
}

// ---------------------------------------------------------------------------
// Event iteration
// ---------------------------------------------------------------------------

/// Blocking iterator over the events of one `/run/stream` call.
///
/// Each call to `next()` reads from the connection only as far as the next
/// event. The iterator ends on the same conditions as [`EventStream`].
pub struct EventIter {
    stream: EventStream,
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for EventIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIter")
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl EventIter {
    /// How the stream ended, or `None` while it is still open.
    pub fn termination(&self) -> Option<Termination> {
        self.stream.termination()
    }

    /// Drain the stream, concatenating `output` text.
    /// See [`EventStream::collect_output`].
    pub fn collect_output(self) -> AgentKernelResult<StreamOutput> {
        block_on(&self.runtime, self.stream.collect_output())
    }
}

impl Iterator for EventIter {
    type Item = AgentKernelResult<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stream.termination().is_some() {
            return None;
        }
        let stream = &mut self.stream;
        match block_on(&self.runtime, async { Ok::<_, AgentKernelError>(stream.next().await) }) {
            Ok(item) => item,
            Err(e) => Some(Err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A sandbox created by [`AgentKernelClient::sandbox()`].
///
/// Removes the sandbox at most once: on the first [`remove()`](Self::remove)
/// or, failing that, when dropped.
pub struct SandboxSession {
    inner: client::SandboxSession,
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for SandboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::SandboxSession")
            .field("name", &self.inner.name())
            .field("removed", &self.inner.is_removed())
            .finish_non_exhaustive()
    }
}

impl SandboxSession {
    /// The sandbox name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Whether removal has already been requested.
    pub fn is_removed(&self) -> bool {
        self.inner.is_removed()
    }

    /// Run a command in this sandbox.
    pub fn run<I, S>(&self, command: I) -> AgentKernelResult<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_on(self.inner.run(command))
    }

    /// Fetch this sandbox's descriptor.
    pub fn info(&self) -> AgentKernelResult<SandboxInfo> {
        self.block_on(self.inner.info())
    }

    /// Read a file from this sandbox.
    pub fn read_file(&self, path: &str) -> AgentKernelResult<FileReadResponse> {
        self.block_on(self.inner.read_file(path))
    }

    /// Write a file into this sandbox.
    pub fn write_file(
        &self,
        path: &str,
        content: &str,
        encoding: FileEncoding,
    ) -> AgentKernelResult<String> {
        self.block_on(self.inner.write_file(path, content, encoding))
    }

    /// Delete a file from this sandbox.
    pub fn delete_file(&self, path: &str) -> AgentKernelResult<String> {
        self.block_on(self.inner.delete_file(path))
    }

    /// Fetch this sandbox's audit log entries.
    pub fn logs(&self) -> AgentKernelResult<Vec<Value>> {
        self.block_on(self.inner.logs())
    }

    /// Remove the sandbox. Only the first call sends a request.
    pub fn remove(&self) -> AgentKernelResult<()> {
        if self.inner.is_removed() {
            return Ok(());
        }
        self.block_on(self.inner.remove())
    }

    fn block_on<F, T>(&self, future: F) -> AgentKernelResult<T>
    where
        F: Future<Output = AgentKernelResult<T>>,
    {
        block_on(&self.runtime, future)
    }
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        if self.inner.is_removed() {
            return;
        }
        if let Err(e) = self.remove() {
            tracing::warn!(
                sandbox = %self.inner.name(),
                error = %e,
                "failed to remove sandbox on drop"
            );
        }
    }
}

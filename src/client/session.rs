//! Sandbox sessions: client-side handles that remove the sandbox they
//! created at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AgentKernelResult;
use crate::types::{FileEncoding, FileReadResponse, RunOutput, SandboxInfo};

use super::kernel_client::AgentKernelClient;

/// A sandbox created by [`AgentKernelClient::sandbox()`].
///
/// The session owns one obligation: issuing `DELETE /sandboxes/{name}`
/// exactly once. [`remove()`](Self::remove) flips a latch before sending the
/// request, so repeated calls are no-ops. A session dropped without being
/// removed spawns the removal on the current tokio runtime; prefer
/// [`AgentKernelClient::with_sandbox()`] when cleanup must be awaited.
///
/// # Example
///
/// ```no_run
/// # async fn example(client: agentkernel_rs::client::AgentKernelClient) -> agentkernel_rs::AgentKernelResult<()> {
/// let sandbox = client.sandbox("build-42", None).await?;
/// let out = sandbox.run(["uname", "-a"]).await?;
/// println!("{}", out.output);
/// sandbox.remove().await?;
/// # Ok(())
/// # }
/// ```
pub struct SandboxSession {
    name: String,
    client: AgentKernelClient,
    removed: Arc<AtomicBool>,
    remove_on_drop: bool,
}

impl std::fmt::Debug for SandboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxSession")
            .field("name", &self.name)
            .field("removed", &self.is_removed())
            .finish_non_exhaustive()
    }
}

impl SandboxSession {
    /// Bind a session to a sandbox the client has just created.
    pub(crate) fn new(name: impl Into<String>, client: AgentKernelClient) -> Self {
        Self {
            name: name.into(),
            client,
            removed: Arc::new(AtomicBool::new(false)),
            remove_on_drop: true,
        }
    }

    /// A handle sharing this session's latch that never removes on drop.
    /// Lent to scoped closures while the owner keeps the cleanup duty.
    pub(crate) fn lend(&self) -> Self {
        Self {
            name: self.name.clone(),
            client: self.client.clone(),
            removed: Arc::clone(&self.removed),
            remove_on_drop: false,
        }
    }

    /// Leave drop-time cleanup to the caller.
    #[cfg(feature = "blocking")]
    pub(crate) fn disarm(mut self) -> Self {
        self.remove_on_drop = false;
        self
    }

    /// The sandbox name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether removal has already been requested.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Run a command in this sandbox.
    pub async fn run<I, S>(&self, command: I) -> AgentKernelResult<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client.exec_in_sandbox(&self.name, command).await
    }

    /// Fetch the current sandbox descriptor.
    pub async fn info(&self) -> AgentKernelResult<SandboxInfo> {
        self.client.get_sandbox(&self.name).await
    }

    /// Read a file from this sandbox.
    pub async fn read_file(&self, path: &str) -> AgentKernelResult<FileReadResponse> {
        self.client.read_file(&self.name, path).await
    }

    /// Write a file to this sandbox.
    pub async fn write_file(
        &self,
        path: &str,
        content: &str,
        encoding: FileEncoding,
    ) -> AgentKernelResult<String> {
        self.client
            .write_file(&self.name, path, content, encoding)
            .await
    }

    /// Delete a file from this sandbox.
    pub async fn delete_file(&self, path: &str) -> AgentKernelResult<String> {
        self.client.delete_file(&self.name, path).await
    }

    /// Audit log entries for this sandbox.
    pub async fn logs(&self) -> AgentKernelResult<Vec<serde_json::Value>> {
        self.client.get_sandbox_logs(&self.name).await
    }

    /// Remove the sandbox. Idempotent: only the first call sends a request,
    /// even if that request fails.
    pub async fn remove(&self) -> AgentKernelResult<()> {
        if self.removed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(sandbox = %self.name, "removing sandbox");
        self.client.remove_sandbox(&self.name).await
    }
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        if !self.remove_on_drop || self.removed.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(sandbox = %name, "session dropped; removing sandbox in background");
                let client = self.client.clone();
                handle.spawn(async move {
                    if let Err(e) = client.remove_sandbox(&name).await {
                        tracing::warn!(sandbox = %name, error = %e, "background sandbox removal failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    sandbox = %name,
                    "session dropped outside a tokio runtime; sandbox was not removed"
                );
            }
        }
    }
}

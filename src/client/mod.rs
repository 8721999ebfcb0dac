//! agentkernel client: run commands in microVM sandboxes over HTTP.
//!
//! - [`AgentKernelClient`]: high-level client with typed methods for every
//!   endpoint (run, stream, sandbox lifecycle, files, logs, batch)
//! - [`SandboxSession`]: a created sandbox that removes itself at most once
//! - [`EventStream`]: decoded event stream for `/run/stream`
//! - [`Transport`] / [`HttpTransport`]: pluggable transport layer
//!
//! # Quick Start
//!
//! ```no_run
//! use agentkernel_rs::client::AgentKernelClient;
//!
//! # async fn example() -> agentkernel_rs::AgentKernelResult<()> {
//! let client = AgentKernelClient::new()?;
//!
//! let out = client.run(["echo", "hello"], None).await?;
//! print!("{}", out.output);
//!
//! let mut stream = client.run_stream(["python3", "train.py"], None).await?;
//! while let Some(event) = stream.next().await {
//!     let event = event?;
//!     if let Some(text) = event.output() {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod envelope;
mod kernel_client;
mod session;
mod sse;
mod transport;

pub use kernel_client::AgentKernelClient;
pub use session::SandboxSession;
pub use sse::{EventStream, Termination};
pub use transport::{HttpTransport, Transport};

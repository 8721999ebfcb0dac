//! # agentkernel-rs: Rust SDK for agentkernel
//!
//! agentkernel runs commands inside isolated microVM sandboxes and exposes
//! them over a JSON HTTP API. This crate is the client side of that API:
//! one-shot runs, live event streams, named sandbox lifecycle, file access,
//! audit logs and parallel batches.
//!
//! ## Overview
//!
//! - **Typed client** with one method per endpoint ([`client::AgentKernelClient`])
//! - **Event streams** for `/run/stream`, decoded lazily from Server-Sent
//!   Events ([`client::EventStream`])
//! - **Sandbox sessions** that remove their sandbox at most once
//!   ([`client::SandboxSession`], [`client::AgentKernelClient::with_sandbox`])
//! - **Blocking facade** with identical semantics ([`blocking::AgentKernelClient`])
//!
//! ## Feature flags
//!
//! | Feature    | Default | Description |
//! |------------|---------|-------------|
//! | `blocking` | yes     | Synchronous client driven by a private runtime |
//!
//! ## Configuration
//!
//! Each setting resolves as explicit value > environment > default:
//!
//! | Setting  | Environment variable    | Default                  |
//! |----------|-------------------------|--------------------------|
//! | base URL | `AGENTKERNEL_BASE_URL`  | `http://localhost:18888` |
//! | API key  | `AGENTKERNEL_API_KEY`   | none                     |
//! | timeout  | `AGENTKERNEL_TIMEOUT`   | 30 seconds               |
//!
//! ## Quick Start
//!
//! ```no_run
//! use agentkernel_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> AgentKernelResult<()> {
//!     let client = AgentKernelClient::new()?;
//!
//!     // One-shot run
//!     let out = client.run(["echo", "hello"], None).await?;
//!     assert_eq!(out.output, "hello\n");
//!
//!     // Streaming run
//!     let mut stream = client.run_stream(["python3", "-u", "train.py"], None).await?;
//!     while let Some(event) = stream.next().await {
//!         let event = event?;
//!         match event.event_type {
//!             StreamEventType::Output => print!("{}", event.output().unwrap_or_default()),
//!             StreamEventType::Done => println!("exit code: {:?}", event.exit_code()),
//!             _ => {}
//!         }
//!     }
//!
//!     // Scoped sandbox, removed when the closure returns
//!     client
//!         .with_sandbox("scratch", None, |sb| async move {
//!             sb.run(["apt-get", "install", "-y", "curl"]).await?;
//!             sb.run(["curl", "--version"]).await
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! All operations return [`AgentKernelResult`]. Failure statuses map to
//! [`AgentKernelError::Validation`] (400), [`AgentKernelError::Auth`] (401),
//! [`AgentKernelError::NotFound`] (404) and [`AgentKernelError::Server`]
//! (anything else); connection failures and timeouts are
//! [`AgentKernelError::Network`].

pub mod builders;
pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod utils;

#[cfg(feature = "blocking")]
pub mod blocking;

/// Prelude module that re-exports commonly used types.
///
/// ```
/// use agentkernel_rs::prelude::*;
///
/// let options = RunOptions::new().with_profile(SecurityProfile::Restrictive);
/// assert!(options.fast);
/// ```
pub mod prelude {
    pub use crate::builders::ClientBuilder;
    pub use crate::client::{AgentKernelClient, EventStream, SandboxSession, Termination};
    pub use crate::config::ClientConfig;
    pub use crate::error::{AgentKernelError, AgentKernelResult, ErrorKind};
    pub use crate::types::{
        BatchCommand, BatchResult, BatchRunResponse, CreateSandboxOptions, FileEncoding,
        FileReadResponse, RunOptions, RunOutput, SandboxInfo, SandboxStatus, SecurityProfile,
        StreamEvent, StreamEventType, StreamOutput,
    };
    pub use crate::utils::unique_sandbox_name;
}

// Re-export core types at crate root for convenience.
pub use builders::ClientBuilder;
pub use client::AgentKernelClient;
pub use config::ClientConfig;
pub use error::{AgentKernelError, AgentKernelResult, ErrorKind};
pub use types::*;

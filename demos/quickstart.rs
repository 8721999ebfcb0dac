//! Quickstart: health check, a one-shot command and a sandbox listing.
//!
//! Start agentkernel locally (it listens on port 18888 by default), then:
//! ```sh
//! cargo run --example quickstart
//! ```
//!
//! Set `AGENTKERNEL_BASE_URL` / `AGENTKERNEL_API_KEY` to target another server.

use agentkernel_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = AgentKernelClient::new()?;
    println!("health: {}", client.health().await?);

    let out = client.run(["echo", "Hello from a sandbox!"], None).await?;
    print!("{}", out.output);

    // Stricter isolation and a specific image for untrusted code.
    let options = RunOptions::new()
        .with_image("python:3.12-alpine")
        .with_profile(SecurityProfile::Restrictive);
    let out = client
        .run(["python3", "-c", "print(sum(range(10)))"], Some(options))
        .await?;
    print!("{}", out.output);

    for sandbox in client.list_sandboxes().await? {
        println!(
            "{:<24} {:<8} {}",
            sandbox.name,
            sandbox.status,
            sandbox.image.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

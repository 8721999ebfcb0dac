//! Sandbox sessions: a named sandbox that is removed when the work is done.
//!
//! ```sh
//! cargo run --example sandbox_session
//! ```

use agentkernel_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let client = AgentKernelClient::new()?;
    let name = unique_sandbox_name("demo");

    // Removal runs whether the closure succeeds or fails.
    let version = client
        .with_sandbox(
            &name,
            Some(CreateSandboxOptions::new().with_image("python:3.12-alpine")),
            |sb| async move {
                sb.write_file(
                    "/tmp/hello.py",
                    "import sys\nprint(sys.version)\n",
                    FileEncoding::Utf8,
                )
                .await?;
                let out = sb.run(["python3", "/tmp/hello.py"]).await?;

                for entry in sb.logs().await? {
                    println!("audit: {entry}");
                }
                Ok::<_, AgentKernelError>(out.output)
            },
        )
        .await?;
    print!("python {version}");

    // Several independent commands at once.
    let batch = client
        .batch_run([
            BatchCommand::new(["echo", "one"]),
            BatchCommand::new(["sh", "-c", "exit 1"]),
            BatchCommand::new(["echo", "three"]),
        ])
        .await?;
    for (i, result) in batch.results.into_iter().enumerate() {
        match result.into_result() {
            Ok(out) => print!("[{i}] {}", out.output),
            Err(e) => println!("[{i}] failed: {e}"),
        }
    }

    Ok(())
}

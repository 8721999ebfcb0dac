//! Blocking client: the same API without an async runtime.
//!
//! ```sh
//! cargo run --example blocking
//! ```

use agentkernel_rs::blocking::AgentKernelClient;
use agentkernel_rs::FileEncoding;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = AgentKernelClient::new()?;
    println!("health: {}", client.health()?);

    print!("{}", client.run(["uname", "-a"], None)?.output);

    for event in client.run_stream(["ls", "-la", "/"], None)? {
        if let Some(text) = event?.output() {
            print!("{text}");
        }
    }

    // Dropping the session removes the sandbox.
    let sandbox = client.sandbox("blocking-demo", None)?;
    sandbox.write_file("greeting.txt", "hello", FileEncoding::Utf8)?;
    println!("{}", sandbox.read_file("greeting.txt")?.content);

    Ok(())
}

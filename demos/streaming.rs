//! Streaming: print a command's output as it is produced.
//!
//! ```sh
//! cargo run --example streaming
//! ```

use agentkernel_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = AgentKernelClient::new()?;

    let mut stream = client
        .run_stream(
            ["sh", "-c", "for i in 1 2 3; do echo tick $i; sleep 1; done"],
            None,
        )
        .await?;

    println!("--- Stream started ---");

    while let Some(event) = stream.next().await {
        let event = event?;
        match event.event_type {
            StreamEventType::Started => println!("[started] {:?}", event.data),
            StreamEventType::Progress => println!("[progress] {:?}", event.data),
            StreamEventType::Output => print!("{}", event.output().unwrap_or_default()),
            StreamEventType::Done => println!("[done] exit code {:?}", event.exit_code()),
            StreamEventType::Error => {
                eprintln!("[error] {}", event.message().unwrap_or("unknown error"))
            }
        }
    }

    if stream.termination() == Some(Termination::Truncated) {
        eprintln!("stream ended before the command finished");
    }

    println!("--- Stream ended ---");
    Ok(())
}

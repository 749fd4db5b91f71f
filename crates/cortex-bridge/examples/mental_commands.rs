//! Print mental commands above a power threshold.
//!
//! The profile must already be trained in the EMOTIV Launcher.
//!
//! ```bash
//! CORTEX_CLIENT_ID=xxx CORTEX_CLIENT_SECRET=yyy CORTEX_PROFILE=alice \
//!     cargo run --example mental_commands
//! ```

use cortex_bridge::protocol::constants::Streams;
use cortex_bridge::{CortexClient, CortexConfig};

const MIN_POWER: f32 = 0.3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = CortexConfig::discover(None)?;
    let client = CortexClient::new(config);
    let mut telemetry = client.events().telemetry();

    let prepared = client.ensure_ready_for_streams().await?;
    println!("Session {} on {}", prepared.session_id, prepared.headset_id);

    let result = client.subscribe_with_retry(&[Streams::COM]).await?;
    if !result.all_succeeded() {
        for failure in result.failed() {
            eprintln!("{}: {:?}", failure.name, failure.status);
        }
        client.disconnect().await;
        return Ok(());
    }

    println!("Think! Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            event = telemetry.recv() => {
                let Ok(event) = event else { break };
                if let Some(command) = event.mental_command() {
                    if command.action != "neutral" && command.power >= MIN_POWER {
                        println!("{:<10} {:.2}", command.action, command.power);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.unsubscribe(&[Streams::COM]).await?;
    client.disconnect().await;
    Ok(())
}

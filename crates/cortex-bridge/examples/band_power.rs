//! Hold a `pow` lease through a StreamHub and print per-channel alpha power.
//!
//! ```bash
//! CORTEX_CLIENT_ID=xxx CORTEX_CLIENT_SECRET=yyy cargo run --example band_power
//! ```

use std::sync::Arc;

use cortex_bridge::protocol::constants::Streams;
use cortex_bridge::{CortexClient, CortexConfig, StreamHub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = CortexConfig::discover(None)?;
    let client = Arc::new(CortexClient::new(config));
    let mut labels = client.events().labels();
    let mut telemetry = client.events().telemetry();

    let hub = StreamHub::new(Arc::clone(&client));
    hub.start(Streams::POW, "band-power-example", None).await?;

    let columns = labels.recv().await?;
    println!("Columns: {}", columns.labels.join(", "));

    let mut count = 0u64;
    while let Ok(event) = telemetry.recv().await {
        let Some(pow) = event.band_power() else {
            continue;
        };
        count += 1;
        let alpha: Vec<String> = pow
            .channel_powers
            .iter()
            .map(|bands| format!("{:.2}", bands[1]))
            .collect();
        println!("[{count}] alpha: [{}]", alpha.join(", "));
        if count == 40 {
            break;
        }
    }

    hub.stop(Streams::POW, "band-power-example").await?;
    client.disconnect().await;
    Ok(())
}

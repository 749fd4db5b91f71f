use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use cortex_bridge::protocol::constants::Streams;
use cortex_bridge::stream_refs::MIN_TTL;
use cortex_bridge::{CortexConfig, LogLevel, StreamHub};

use crate::app::connect;

#[derive(Args)]
pub struct StreamArgs {
    /// Streams to hold (eeg, dev, mot, eq, pow, met, com, fac, sys)
    #[arg(required = true, value_parser = clap::builder::PossibleValuesParser::new(Streams::ALL.iter().copied()))]
    pub streams: Vec<String>,

    /// Holder id for the leases
    #[arg(long, default_value = "cortex-bridge-cli")]
    pub holder: String,

    /// Lease TTL in seconds (renewed every third of it)
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Headset to use instead of the configured / first connected one
    #[arg(long)]
    pub headset: Option<String>,

    /// Profile to load before streaming
    #[arg(long)]
    pub profile: Option<String>,

    /// Stop after this many samples (0 = until Ctrl+C)
    #[arg(long, default_value_t = 0)]
    pub max_samples: u64,
}

/// Renewal leaves two chances before a lease lapses, even at the minimum TTL.
fn renew_period(ttl: Duration) -> Duration {
    ttl.max(MIN_TTL) / 3
}

pub async fn cmd_stream(
    mut config: CortexConfig,
    args: StreamArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.headset.is_some() {
        config.headset_id = args.headset;
    }
    if args.profile.is_some() {
        config.profile = args.profile;
    }
    let ttl = args
        .ttl_secs
        .map_or_else(|| config.streams.holder_ttl(), Duration::from_secs);
    let prune_interval = config.streams.prune_interval();

    let client = Arc::new(connect(config).await?);
    let mut telemetry = client.events().telemetry();
    let mut labels = client.events().labels();
    let mut logs = client.events().logs();

    let hub = Arc::new(StreamHub::new(Arc::clone(&client)));
    let pruner = hub.spawn_pruner(prune_interval);

    let mut held = Vec::new();
    for stream in &args.streams {
        match hub.start(stream, args.holder.as_str(), Some(ttl)).await {
            Ok(_) => held.push(stream.clone()),
            Err(e) => eprintln!("Could not start {stream}: {e}"),
        }
    }

    if held.is_empty() {
        eprintln!("No stream could be started.");
    } else {
        eprintln!("Streaming {} (Ctrl+C to stop)", held.join(", "));

        let mut renew = tokio::time::interval(renew_period(ttl));
        renew.tick().await;
        let mut samples = 0u64;

        loop {
            tokio::select! {
                event = telemetry.recv() => match event {
                    Ok(event) => {
                        println!(
                            "{}",
                            json!({ "event": event.event_name(), "sid": event.session_id, "data": event.to_payload() })
                        );
                        samples += 1;
                        if args.max_samples > 0 && samples >= args.max_samples {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => eprintln!("Output lagged, {skipped} samples dropped"),
                    Err(RecvError::Closed) => break,
                },
                event = labels.recv() => {
                    if let Ok(event) = event {
                        println!("{}", json!({ "event": "new_data_labels", "data": event }));
                    }
                },
                event = logs.recv() => {
                    if let Ok(event) = event {
                        let level = match event.level {
                            LogLevel::Info => "info",
                            LogLevel::Warn => "warn",
                            LogLevel::Error => "error",
                        };
                        eprintln!("[{level}] {}", event.message);
                    }
                },
                _ = renew.tick() => {
                    for stream in &held {
                        if hub.renew(stream, args.holder.as_str(), Some(ttl)).is_none() {
                            tracing::warn!(stream = %stream, "Lease lost, not renewed");
                        }
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\nStreaming stopped.");
                    break;
                }
            }
        }
    }

    pruner.abort();
    for stream in &held {
        if let Err(e) = hub.stop(stream, args.holder.as_str()).await {
            eprintln!("Unsubscribe of {stream} failed: {e}");
        }
    }
    client.disconnect().await;
    Ok(())
}

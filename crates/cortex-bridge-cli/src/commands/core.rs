use std::time::Duration;

use cortex_bridge::protocol::headset::{DeviceCommand, HeadsetInfo};
use cortex_bridge::{CortexConfig, CortexResult};

use crate::app::{connect, print_pretty_json};

/// How long a rescan gets before the list is read back.
const REFRESH_SETTLE: Duration = Duration::from_secs(2);

// ─── Info ───────────────────────────────────────────────────────────────

/// Each part is reported on its own; one failing does not hide the others.
pub async fn cmd_info(config: CortexConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config).await?;

    match client.get_cortex_info().await {
        Ok(info) => {
            println!("Cortex service:");
            print_pretty_json(&info);
        }
        Err(e) => eprintln!("getCortexInfo failed: {e}"),
    }

    match client.get_user_login().await {
        Ok(users) if users.is_empty() => println!("\nNo user logged in to the EMOTIV Launcher."),
        Ok(users) => {
            println!("\nLogged-in users:");
            for user in users {
                println!(
                    "  {} (last login: {})",
                    user.username,
                    user.last_login_time.as_deref().unwrap_or("unknown")
                );
            }
        }
        Err(e) => eprintln!("getUserLogin failed: {e}"),
    }

    if client.config().has_credentials() {
        match client.get_user_information().await {
            Ok(info) => {
                println!("\nUser information:");
                print_pretty_json(&info);
            }
            Err(e) => eprintln!("getUserInformation failed: {e}"),
        }

        match client.get_license_info().await {
            Ok(info) => {
                println!("\nLicense:");
                print_pretty_json(&info);
            }
            Err(e) => eprintln!("getLicenseInfo failed: {e}"),
        }
    }

    client.disconnect().await;
    Ok(())
}

// ─── Headsets ───────────────────────────────────────────────────────────

fn print_headset(headset: &HeadsetInfo) {
    let mut line = format!("{:<24} {:<12}", headset.id, headset.status.as_str());
    if let Some(by) = &headset.connected_by {
        line.push_str(&format!(" via {by}"));
    }
    if let Some(firmware) = &headset.firmware {
        line.push_str(&format!(" fw {firmware}"));
    }
    if !headset.sensors.is_empty() {
        line.push_str(&format!(" [{} sensors]", headset.sensors.len()));
    }
    println!("{line}");
}

pub async fn cmd_headsets(
    config: CortexConfig,
    refresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config).await?;

    if refresh {
        client.refresh_headsets().await?;
        tokio::time::sleep(REFRESH_SETTLE).await;
    }

    let headsets = client.query_headsets().await?;
    if headsets.is_empty() {
        println!("No headsets found. Turn one on, or retry with --refresh.");
    }
    for headset in &headsets {
        print_headset(headset);
    }

    client.disconnect().await;
    Ok(())
}

// ─── Connect ────────────────────────────────────────────────────────────

pub async fn cmd_connect(
    config: CortexConfig,
    headset_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config).await?;

    let result: CortexResult<String> = async {
        client
            .control_device(DeviceCommand::Connect, Some(headset_id))
            .await?;
        client.acquire_headset(Some(headset_id)).await
    }
    .await;

    client.disconnect().await;
    let connected = result?;
    println!("{connected} connected");
    Ok(())
}

use std::path::Path;

use tracing_subscriber::EnvFilter;

use cortex_bridge::{CortexClient, CortexConfig, CortexResult};

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "cortex_bridge=debug,cortex_bridge_cli=debug"
    } else {
        "cortex_bridge=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_config(path: Option<&Path>, url: Option<&str>) -> CortexResult<CortexConfig> {
    let mut config = CortexConfig::discover(path)?;
    if let Some(url) = url {
        config.cortex_url = url.to_string();
    }
    if !config.has_credentials() {
        eprintln!(
            "Note: no client credentials configured. Set CORTEX_CLIENT_ID and \
             CORTEX_CLIENT_SECRET, or create a cortex-bridge.toml file."
        );
    }
    Ok(config)
}

/// Build a client and open its connection.
pub async fn connect(config: CortexConfig) -> CortexResult<CortexClient> {
    let client = CortexClient::new(config);
    eprintln!("Connecting to {}...", client.config().cortex_url);
    if let Err(e) = client.connect().await {
        eprintln!("Make sure the EMOTIV Launcher is running.");
        return Err(e);
    }
    Ok(client)
}

pub fn print_pretty_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("Failed to format JSON output: {err}");
            println!("{value}");
        }
    }
}

//! # cortex-bridge
//!
//! Session, subscription and stream-lease layer for the
//! [Emotiv Cortex WebSocket API](https://emotiv.gitbook.io/cortex-api/).
//!
//! The bridge keeps one JSON-RPC connection to a locally running Cortex
//! service, drives a headset to `connected`, holds an authorized session,
//! and turns the service's stream pushes into typed events on an
//! [`EventBus`]. Consumers lease streams through a [`StreamHub`]: the first
//! lease subscribes, the last one to leave (or expire) unsubscribes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use cortex_bridge::{CortexClient, CortexConfig, StreamHub};
//!
//! #[tokio::main]
//! async fn main() -> cortex_bridge::CortexResult<()> {
//!     let config = CortexConfig::discover(None)?;
//!     let client = Arc::new(CortexClient::new(config));
//!     let mut telemetry = client.events().telemetry();
//!
//!     let hub = StreamHub::new(Arc::clone(&client));
//!     hub.start("pow", "dashboard", None).await?;
//!
//!     while let Ok(event) = telemetry.recv().await {
//!         println!("{} {}", event.event_name(), event.to_payload());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`transport`] | WebSocket link, TLS, reader task |
//! | [`rpc`] | request ids, response matching, per-call timeout |
//! | [`demux`] | stream data and warnings onto the [`EventBus`] |
//! | [`device`] | headset query/control and the acquisition loop |
//! | [`session`] | access check, authorize, session lifecycle, bootstrap |
//! | [`subscription`] | subscribe/unsubscribe and column labels |
//! | [`stream_refs`] | per-stream holder leases |
//! | [`hub`] | leases driving subscriptions |
//! | [`client`] | the façade over all of the above |
//!
//! ## Configuration
//!
//! See [`CortexConfig`]. The simplest setup uses environment variables:
//!
//! ```bash
//! export CORTEX_CLIENT_ID="your-client-id"
//! export CORTEX_CLIENT_SECRET="your-client-secret"
//! ```
//!
//! Or a `cortex-bridge.toml` file:
//!
//! ```toml
//! client_id = "your-client-id"
//! client_secret = "your-client-secret"
//! profile = "alice"
//! ```

pub mod client;
pub mod config;
pub mod demux;
pub mod device;
pub mod error;
pub mod events;
pub mod hub;
pub mod protocol;
pub mod retry;
pub mod rpc;
pub mod session;
pub mod stream_refs;
pub mod subscription;
pub mod transport;

// ─── Public re-exports ──────────────────────────────────────────────────

pub use client::CortexClient;
pub use config::CortexConfig;
pub use demux::{StreamKind, TelemetryEvent};
pub use error::{CortexError, CortexResult};
pub use events::{ConnectionEvent, DataLabels, EventBus, LogEvent, LogLevel, RawStreamMessage};
pub use hub::StreamHub;
pub use retry::RetryPolicy;
pub use session::{Prepared, SessionPhase};
pub use stream_refs::{HolderId, StreamRefManager};
pub use subscription::{StreamOutcome, StreamStatus, StreamSubscriptionResult};

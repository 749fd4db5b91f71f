//! # Event Bus
//!
//! One `tokio::sync::broadcast` channel per event kind. Publishing never
//! blocks and never fails: with no receivers the event is dropped, and a
//! receiver that falls behind loses the oldest events
//! ([`broadcast::error::RecvError::Lagged`]) without slowing anyone else
//! down, including the reader task that publishes them.
//!
//! ```text
//!   reader task ──► demux ──┬─► telemetry   (TelemetryEvent)
//!                           ├─► raw         (eeg / pow envelopes)
//!                           └─► warnings    (Warning)
//!   subscription engine ────┬─► labels      (DataLabels)
//!                           └─► logs        (LogEvent)
//!   client / session ───────┴─► connection  (ConnectionEvent)
//! ```

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::demux::TelemetryEvent;
use crate::protocol::rpc::Warning;

/// Default per-channel buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A human-readable line meant for whoever hosts the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
}

/// Column labels of a freshly subscribed stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataLabels {
    #[serde(rename = "streamName")]
    pub stream_name: String,
    pub labels: Vec<String>,
}

/// A stream message republished untouched (`eeg` and `pow`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawStreamMessage {
    pub stream: &'static str,
    pub message: Value,
}

/// Link and session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected {
        url: String,
    },
    Disconnected {
        reason: String,
    },
    SessionCreated {
        session_id: String,
        headset_id: Option<String>,
    },
    SessionClosed {
        session_id: String,
    },
}

/// Fan-out point for everything the bridge reports asynchronously.
#[derive(Debug, Clone)]
pub struct EventBus {
    logs: broadcast::Sender<LogEvent>,
    labels: broadcast::Sender<DataLabels>,
    telemetry: broadcast::Sender<TelemetryEvent>,
    raw: broadcast::Sender<RawStreamMessage>,
    warnings: broadcast::Sender<Warning>,
    connection: broadcast::Sender<ConnectionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// # Panics
    /// If `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            logs: broadcast::channel(capacity).0,
            labels: broadcast::channel(capacity).0,
            telemetry: broadcast::channel(capacity).0,
            raw: broadcast::channel(capacity).0,
            warnings: broadcast::channel(capacity).0,
            connection: broadcast::channel(capacity).0,
        }
    }

    // ─── Publish ────────────────────────────────────────────────────

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self.logs.send(LogEvent {
            level,
            message: message.into(),
        });
    }

    pub fn publish_labels(&self, stream_name: impl Into<String>, labels: Vec<String>) {
        let _ = self.labels.send(DataLabels {
            stream_name: stream_name.into(),
            labels,
        });
    }

    pub fn publish_telemetry(&self, event: TelemetryEvent) {
        let _ = self.telemetry.send(event);
    }

    pub fn publish_raw(&self, stream: &'static str, message: Value) {
        let _ = self.raw.send(RawStreamMessage { stream, message });
    }

    pub fn publish_warning(&self, warning: Warning) {
        let _ = self.warnings.send(warning);
    }

    pub fn publish_connection(&self, event: ConnectionEvent) {
        let _ = self.connection.send(event);
    }

    // ─── Subscribe ──────────────────────────────────────────────────

    #[must_use]
    pub fn logs(&self) -> broadcast::Receiver<LogEvent> {
        self.logs.subscribe()
    }

    #[must_use]
    pub fn labels(&self) -> broadcast::Receiver<DataLabels> {
        self.labels.subscribe()
    }

    #[must_use]
    pub fn telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }

    #[must_use]
    pub fn raw(&self) -> broadcast::Receiver<RawStreamMessage> {
        self.raw.subscribe()
    }

    #[must_use]
    pub fn warnings(&self) -> broadcast::Receiver<Warning> {
        self.warnings.subscribe()
    }

    #[must_use]
    pub fn connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.subscribe()
    }
}

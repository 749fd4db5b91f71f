//! # Telemetry Demultiplexer
//!
//! Stateless routing of every inbound message the correlator did not claim.
//!
//! - Messages with a `sid` are stream data. The payload key decides the
//!   kind, checked in a fixed order (see [`StreamKind::CLASSIFICATION_ORDER`]);
//!   the first key present wins. `eeg` and `pow` are also republished raw.
//! - `{"warning": {...}}` goes to the warnings channel and the log channel.
//! - A stray `result`/`error` (late response to a timed-out call) is logged
//!   at debug level.
//! - Anything else is dropped without a trace.

use serde_json::{Value, json};

use crate::events::{EventBus, LogLevel};
use crate::protocol::constants::Streams;
use crate::protocol::rpc::Warning;
use crate::protocol::streams::{
    BandPowerData, DeviceStatus, FacialExpression, MentalCommand, MotionData,
};

/// Kinds of stream data the demultiplexer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Com,
    Fac,
    Eeg,
    Mot,
    Dev,
    Met,
    Pow,
    Sys,
    Eq,
}

impl StreamKind {
    /// First matching payload key wins.
    pub const CLASSIFICATION_ORDER: [StreamKind; 9] = [
        StreamKind::Com,
        StreamKind::Fac,
        StreamKind::Eeg,
        StreamKind::Mot,
        StreamKind::Dev,
        StreamKind::Met,
        StreamKind::Pow,
        StreamKind::Sys,
        StreamKind::Eq,
    ];

    /// The payload key, which is also the stream name.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            StreamKind::Com => Streams::COM,
            StreamKind::Fac => Streams::FAC,
            StreamKind::Eeg => Streams::EEG,
            StreamKind::Mot => Streams::MOT,
            StreamKind::Dev => Streams::DEV,
            StreamKind::Met => Streams::MET,
            StreamKind::Pow => Streams::POW,
            StreamKind::Sys => Streams::SYS,
            StreamKind::Eq => Streams::EQ,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::CLASSIFICATION_ORDER
            .into_iter()
            .find(|kind| kind.key() == name)
    }

    /// `new_<key>_data`
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamKind::Com => "new_com_data",
            StreamKind::Fac => "new_fac_data",
            StreamKind::Eeg => "new_eeg_data",
            StreamKind::Mot => "new_mot_data",
            StreamKind::Dev => "new_dev_data",
            StreamKind::Met => "new_met_data",
            StreamKind::Pow => "new_pow_data",
            StreamKind::Sys => "new_sys_data",
            StreamKind::Eq => "new_eq_data",
        }
    }

    /// Whether the whole envelope is also published on the raw channel.
    #[must_use]
    pub fn republishes_raw(&self) -> bool {
        matches!(self, StreamKind::Eeg | StreamKind::Pow)
    }
}

/// One classified stream sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub kind: StreamKind,
    pub session_id: String,
    pub values: Vec<Value>,
    /// Server timestamp in seconds; `0.0` when the message had none.
    pub time: f64,
}

impl TelemetryEvent {
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        self.kind.event_name()
    }

    /// The derived shape relayed to consumers: `{<key>: values, time}`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert(self.kind.key().to_string(), Value::Array(self.values.clone()));
        payload.insert("time".to_string(), json!(self.time));
        Value::Object(payload)
    }

    #[must_use]
    pub fn mental_command(&self) -> Option<MentalCommand> {
        (self.kind == StreamKind::Com)
            .then(|| MentalCommand::from_com_array(&self.values))
            .flatten()
    }

    #[must_use]
    pub fn facial_expression(&self) -> Option<FacialExpression> {
        (self.kind == StreamKind::Fac)
            .then(|| FacialExpression::from_fac_array(&self.values))
            .flatten()
    }

    #[must_use]
    pub fn device_status(&self) -> Option<DeviceStatus> {
        (self.kind == StreamKind::Dev)
            .then(|| DeviceStatus::from_dev_array(&self.values))
            .flatten()
    }

    #[must_use]
    pub fn motion(&self) -> Option<MotionData> {
        (self.kind == StreamKind::Mot)
            .then(|| MotionData::from_mot_array(&self.values, self.time))
            .flatten()
    }

    #[must_use]
    pub fn band_power(&self) -> Option<BandPowerData> {
        (self.kind == StreamKind::Pow)
            .then(|| BandPowerData::from_pow_array(&self.values, self.time))
            .flatten()
    }
}

/// Classify a stream message. `None` unless it carries a string `sid` and
/// one of the known payload keys.
#[must_use]
pub fn classify(message: &Value) -> Option<TelemetryEvent> {
    let session_id = message.get("sid")?.as_str()?;
    let (kind, payload) = StreamKind::CLASSIFICATION_ORDER
        .into_iter()
        .find_map(|kind| message.get(kind.key()).map(|payload| (kind, payload)))?;

    let values = match payload {
        Value::Array(values) => values.clone(),
        other => vec![other.clone()],
    };

    Some(TelemetryEvent {
        kind,
        session_id: session_id.to_string(),
        values,
        time: message.get("time").and_then(Value::as_f64).unwrap_or(0.0),
    })
}

/// Routes unclaimed inbound messages onto the [`EventBus`].
#[derive(Debug, Clone)]
pub struct Demux {
    bus: EventBus,
}

impl Demux {
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn dispatch(&self, message: Value) {
        if message.get("sid").is_some() {
            match classify(&message) {
                Some(event) => {
                    if event.kind.republishes_raw() {
                        self.bus.publish_raw(event.kind.key(), message);
                    }
                    self.bus.publish_telemetry(event);
                }
                None => tracing::debug!("Stream message with unknown payload dropped"),
            }
            return;
        }

        if let Some(warning) = message.get("warning") {
            match serde_json::from_value::<Warning>(warning.clone()) {
                Ok(warning) => {
                    tracing::info!(code = warning.code, message = %warning.message, "Cortex warning");
                    self.bus.log(
                        LogLevel::Warn,
                        format!("Cortex warning {}: {}", warning.code, warning.message),
                    );
                    self.bus.publish_warning(warning);
                }
                Err(e) => tracing::warn!("Malformed Cortex warning: {e}"),
            }
            return;
        }

        if message.get("result").is_some() || message.get("error").is_some() {
            tracing::debug!(id = ?message.get("id"), "Response for unknown request id");
        }
    }
}

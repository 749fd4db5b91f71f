//! Headset discovery protocol types.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Connection status of a headset as reported by `queryHeadsets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadsetStatus {
    Discovered,
    Connecting,
    Connected,
    Disconnected,
    /// Anything Cortex reports that the bridge does not know about.
    Unknown,
}

impl HeadsetStatus {
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "discovered" => HeadsetStatus::Discovered,
            "connecting" => HeadsetStatus::Connecting,
            "connected" => HeadsetStatus::Connected,
            "disconnected" => HeadsetStatus::Disconnected,
            _ => HeadsetStatus::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadsetStatus::Discovered => "discovered",
            HeadsetStatus::Connecting => "connecting",
            HeadsetStatus::Connected => "connected",
            HeadsetStatus::Disconnected => "disconnected",
            HeadsetStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HeadsetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HeadsetStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(HeadsetStatus::Unknown, HeadsetStatus::parse))
    }
}

/// Headset info returned by `queryHeadsets`.
#[derive(Debug, Clone, Deserialize)]
pub struct HeadsetInfo {
    /// Headset ID (e.g., "INSIGHT-A1B2C3D4").
    pub id: String,

    #[serde(default = "unknown_status")]
    pub status: HeadsetStatus,

    /// How the headset is connected: "dongle", "bluetooth", "usb cable".
    #[serde(rename = "connectedBy")]
    pub connected_by: Option<String>,

    /// Firmware version string.
    pub firmware: Option<String>,

    /// EEG sensor/channel names available on this headset.
    #[serde(default)]
    pub sensors: Vec<String>,

    /// Motion sensor names available on this headset.
    #[serde(rename = "motionSensors", default)]
    pub motion_sensors: Vec<String>,

    /// Custom name of the headset, if set by the user.
    #[serde(rename = "customName")]
    pub custom_name: Option<String>,

    /// Virtual headset flag (true for virtual devices)
    #[serde(rename = "isVirtual")]
    pub is_virtual: Option<bool>,

    /// Forward-compatible storage for fields the bridge does not model.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn unknown_status() -> HeadsetStatus {
    HeadsetStatus::Unknown
}

impl HeadsetInfo {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == HeadsetStatus::Connected
    }
}

/// Commands for the `controlDevice` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Start a headset scan.
    Refresh,
    /// Connect a discovered headset.
    Connect,
    /// Disconnect a headset.
    Disconnect,
}

impl DeviceCommand {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::Refresh => "refresh",
            DeviceCommand::Connect => "connect",
            DeviceCommand::Disconnect => "disconnect",
        }
    }
}

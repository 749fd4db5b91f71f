//! Subscribe/unsubscribe payloads and typed views over stream data arrays.
//!
//! Stream data arrives as `{"sid": ..., "time": ..., "<key>": [...]}` where
//! the array layout is described by the `cols` the server returned on
//! `subscribe`. The parsers here turn the arrays the bridge cares about into
//! small structs; anything they do not understand yields `None`.

use serde::Deserialize;
use serde_json::Value;

fn f64_to_f32(value: f64) -> Option<f32> {
    if !value.is_finite() {
        return None;
    }
    value.to_string().parse::<f32>().ok()
}

fn value_to_f32(value: &Value) -> Option<f32> {
    value.as_f64().and_then(f64_to_f32)
}

fn seconds_to_micros_i64(timestamp_secs: f64) -> Option<i64> {
    if !timestamp_secs.is_finite() {
        return None;
    }
    let micros = timestamp_secs * 1_000_000.0;
    if !micros.is_finite() {
        return None;
    }
    format!("{micros:.0}").parse::<i64>().ok()
}

// ─── Subscribe / Unsubscribe ────────────────────────────────────────────

/// Result of `subscribe` / `unsubscribe`: parallel success and failure lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeResponse {
    #[serde(default)]
    pub success: Vec<StreamSuccess>,
    #[serde(default)]
    pub failure: Vec<StreamFailure>,
}

/// One stream the server accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSuccess {
    #[serde(rename = "streamName")]
    pub stream_name: String,

    /// Column descriptors. Mostly strings; `dev` nests the per-sensor list
    /// as an array in position 2. Absent on `unsubscribe`.
    #[serde(default)]
    pub cols: Option<Vec<Value>>,
}

/// One stream the server rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFailure {
    #[serde(rename = "streamName")]
    pub stream_name: String,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

// ─── Typed stream payloads ──────────────────────────────────────────────

/// Parsed `com` sample: `[action, power]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MentalCommand {
    /// The detected action name (e.g., "push", "pull", "neutral").
    pub action: String,
    /// Action intensity 0.0–1.0.
    pub power: f32,
}

impl MentalCommand {
    #[must_use]
    pub fn from_com_array(com: &[Value]) -> Option<Self> {
        Some(Self {
            action: com.first()?.as_str()?.to_string(),
            power: value_to_f32(com.get(1)?)?,
        })
    }
}

/// Parsed `fac` sample:
/// `[eyeAct, uAct, uPow, lAct, lPow]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FacialExpression {
    /// Eye action (e.g., "blink", "winkL", "winkR", "lookL", "lookR").
    pub eye_action: String,
    pub upper_face_action: String,
    pub upper_face_power: f32,
    pub lower_face_action: String,
    pub lower_face_power: f32,
}

impl FacialExpression {
    #[must_use]
    pub fn from_fac_array(fac: &[Value]) -> Option<Self> {
        if fac.len() < 5 {
            return None;
        }
        Some(Self {
            eye_action: fac[0].as_str()?.to_string(),
            upper_face_action: fac[1].as_str()?.to_string(),
            upper_face_power: value_to_f32(&fac[2])?,
            lower_face_action: fac[3].as_str()?.to_string(),
            lower_face_power: value_to_f32(&fac[4])?,
        })
    }
}

/// Parsed `dev` sample.
///
/// Layout: `[battery, signal, [cq_1, .., cq_n, overall], batteryPercent]`.
/// The nested array lines up with the nested label array of the `dev`
/// subscribe columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Battery level 0–4 (coarse indicator).
    pub battery_level: u8,
    /// Wireless signal strength 0.0–1.0.
    pub signal_strength: f32,
    /// Contact quality values as reported (0–4 per sensor, last entry overall).
    pub contact_quality: Vec<f32>,
    /// Precise battery percentage 0–100, when reported.
    pub battery_percent: Option<u8>,
}

impl DeviceStatus {
    #[must_use]
    pub fn from_dev_array(dev: &[Value]) -> Option<Self> {
        let battery_level = u8::try_from(dev.first()?.as_u64()?).ok()?;
        let signal_strength = value_to_f32(dev.get(1)?)?;
        let contact_quality = dev
            .get(2)?
            .as_array()?
            .iter()
            .map(value_to_f32)
            .collect::<Option<Vec<f32>>>()?;
        let battery_percent = dev
            .get(3)
            .and_then(Value::as_u64)
            .and_then(|pct| u8::try_from(pct).ok());

        Some(Self {
            battery_level,
            signal_strength,
            contact_quality,
            battery_percent,
        })
    }
}

/// Parsed `mot` sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionData {
    /// Timestamp in microseconds.
    pub timestamp: i64,
    /// Quaternion orientation [Q0, Q1, Q2, Q3].
    pub quaternion: [f32; 4],
    /// Accelerometer readings [x, y, z] in g.
    pub accelerometer: [f32; 3],
    /// Magnetometer readings [x, y, z].
    pub magnetometer: [f32; 3],
}

impl MotionData {
    /// Expected layout (Insight/EPOC X):
    /// `[COUNTER, INTERPOLATED, Q0, Q1, Q2, Q3, ACCX, ACCY, ACCZ, MAGX, MAGY, MAGZ]`
    #[must_use]
    pub fn from_mot_array(mot: &[Value], timestamp: f64) -> Option<Self> {
        if mot.len() < 12 {
            return None;
        }
        let at = |i: usize| value_to_f32(&mot[i]);

        Some(Self {
            timestamp: seconds_to_micros_i64(timestamp)?,
            quaternion: [at(2)?, at(3)?, at(4)?, at(5)?],
            accelerometer: [at(6)?, at(7)?, at(8)?],
            magnetometer: [at(9)?, at(10)?, at(11)?],
        })
    }
}

/// Parsed `pow` sample.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPowerData {
    /// Timestamp in microseconds.
    pub timestamp: i64,
    /// Per-channel band powers: `[channel][band]` where bands are
    /// `[theta, alpha, betaL, betaH, gamma]` in uV²/Hz.
    pub channel_powers: Vec<[f32; 5]>,
}

impl BandPowerData {
    /// The array is flat, 5 values per channel. A trailing partial group
    /// is ignored.
    #[must_use]
    pub fn from_pow_array(pow: &[Value], timestamp: f64) -> Option<Self> {
        let channel_powers = pow
            .chunks_exact(5)
            .map(|chunk| {
                Some([
                    value_to_f32(&chunk[0])?,
                    value_to_f32(&chunk[1])?,
                    value_to_f32(&chunk[2])?,
                    value_to_f32(&chunk[3])?,
                    value_to_f32(&chunk[4])?,
                ])
            })
            .collect::<Option<Vec<[f32; 5]>>>()?;

        if channel_powers.is_empty() {
            return None;
        }

        Some(Self {
            timestamp: seconds_to_micros_i64(timestamp)?,
            channel_powers,
        })
    }
}

//! JSON-RPC envelopes exchanged with the Cortex service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request to the Cortex API.
#[derive(Debug, Serialize)]
pub struct CortexRequest {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl CortexRequest {
    /// Create a new request. Empty object params are omitted from the wire.
    pub fn new(id: u64, method: &'static str, params: Value) -> Self {
        let params = if params.as_object().is_some_and(serde_json::Map::is_empty) || params.is_null()
        {
            None
        } else {
            Some(params)
        };

        Self {
            id,
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response from the Cortex API.
#[derive(Debug, Deserialize)]
pub struct CortexResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

/// The error object of a failed response.
///
/// Converted to [`CortexError::Rpc`](crate::CortexError::Rpc) by the
/// correlator; the numeric code is never folded into a string.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cortex API error {}: {}", self.code, self.message)
    }
}

/// Body of an unsolicited `{"warning": {...}}` push message.
///
/// `message` is kept as raw JSON: depending on the code it is a string or
/// an object (e.g. `{"headsetId": ..., "behavior": ...}` for code 104).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Warning {
    pub code: i32,
    #[serde(default)]
    pub message: Value,
}

impl Warning {
    /// Headset id carried by device warnings, if any.
    #[must_use]
    pub fn headset_id(&self) -> Option<&str> {
        self.message.get("headsetId").and_then(Value::as_str)
    }
}

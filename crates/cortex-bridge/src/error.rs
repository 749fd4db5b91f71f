//! # Error Types
//!
//! Semantic error types for the bridge. Server-reported failures always keep
//! their numeric JSON-RPC code: [`CortexError::Rpc`] carries `{code, message}`
//! as first-class fields, and the wrapper variants ([`CortexError::AuthRpc`],
//! [`CortexError::RetryExhausted`]) expose it again through
//! [`CortexError::code`]. Higher layers classify retries from that code, never
//! from the error text.

use thiserror::Error;

use crate::protocol::constants::ErrorCodes;

/// Convenient Result alias for Cortex operations.
pub type CortexResult<T> = std::result::Result<T, CortexError>;

/// All errors that can occur while talking to the Cortex service.
#[derive(Error, Debug)]
pub enum CortexError {
    // ─── Connection ─────────────────────────────────────────────────
    /// Failed to establish a WebSocket connection to the Cortex service.
    #[error("Failed to connect to Cortex at {url}: {reason}. Is the EMOTIV Launcher running?")]
    ConnectionFailed { url: String, reason: String },

    /// The transport link is not open.
    #[error("Not connected to Cortex")]
    NotConnected,

    /// The connection closed while a request was still waiting for its response.
    #[error("Connection to Cortex lost: {reason}")]
    ConnectionLost { reason: String },

    // ─── Authentication / session ───────────────────────────────────
    /// No client id / client secret configured.
    #[error("Missing clientId/clientSecret. Set CORTEX_CLIENT_ID and CORTEX_CLIENT_SECRET.")]
    MissingCredentials,

    /// The `authorize` call was rejected or could not be completed.
    #[error("Authorization failed: {cause}")]
    AuthRpc { cause: Box<CortexError> },

    /// An operation needed a cortex token but none is held.
    #[error("Not authorized")]
    NotAuthorized,

    /// An operation needed an active session but none is held.
    #[error("No session")]
    NoSession,

    // ─── Headset ────────────────────────────────────────────────────
    /// The device acquisition loop gave up without a connected headset.
    #[error("No connected headset after {attempts} attempts")]
    NoConnectedDevice { attempts: u32 },

    // ─── Retry ──────────────────────────────────────────────────────
    /// All attempts of a retry loop hit the device-busy code.
    #[error("Operation failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: Box<CortexError>,
    },

    // ─── API ────────────────────────────────────────────────────────
    /// Error object returned by the server in a JSON-RPC response.
    #[error("Cortex API error {code}: {message}")]
    Rpc { code: i32, message: String },

    // ─── Timeout ────────────────────────────────────────────────────
    /// An operation timed out waiting for a response.
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    // ─── Protocol ───────────────────────────────────────────────────
    /// Received an unexpected or malformed message from the Cortex service.
    #[error("Protocol error: {reason}")]
    ProtocolError { reason: String },

    // ─── Config ─────────────────────────────────────────────────────
    /// Configuration file error (missing, malformed, or invalid values).
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    // ─── WebSocket ──────────────────────────────────────────────────
    /// Low-level WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    Tls(String),

    // ─── I/O ────────────────────────────────────────────────────────
    /// Filesystem or I/O error (config file reading, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CortexError {
    /// Build the error for a JSON-RPC error object.
    pub fn from_api_error(code: i32, message: impl Into<String>) -> Self {
        CortexError::Rpc {
            code,
            message: message.into(),
        }
    }

    /// The server-reported numeric code, looking through wrapper variants.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            CortexError::Rpc { code, .. } => Some(*code),
            CortexError::AuthRpc { cause } => cause.code(),
            CortexError::RetryExhausted { last_error, .. } => last_error.code(),
            _ => None,
        }
    }

    /// Returns `true` for the one transient server condition the retry loops
    /// wait out: the headset is busy or not ready yet (`-32152`).
    #[must_use]
    pub fn is_device_busy(&self) -> bool {
        matches!(self, CortexError::Rpc { code, .. } if *code == ErrorCodes::HEADSET_NOT_READY)
    }

    /// Returns `true` for token problems that a fresh `authorize` can fix.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self.code(),
            Some(ErrorCodes::INVALID_CORTEX_TOKEN | ErrorCodes::TOKEN_EXPIRED)
        ) || matches!(self, CortexError::NotAuthorized)
    }

    /// Returns `true` if this error indicates the connection is dead
    /// and a reconnect is needed.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            CortexError::ConnectionFailed { .. }
                | CortexError::ConnectionLost { .. }
                | CortexError::NotConnected
                | CortexError::WebSocket(_)
        )
    }
}

// ─── From impls for external error types ────────────────────────────────

impl From<tokio_tungstenite::tungstenite::Error> for CortexError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        CortexError::WebSocket(err.to_string())
    }
}

#[cfg(feature = "native-tls")]
impl From<native_tls::Error> for CortexError {
    fn from(err: native_tls::Error) -> Self {
        CortexError::Tls(err.to_string())
    }
}

#[cfg(feature = "rustls-tls")]
impl From<rustls::Error> for CortexError {
    fn from(err: rustls::Error) -> Self {
        CortexError::Tls(err.to_string())
    }
}

#[cfg(feature = "config-toml")]
impl From<toml::de::Error> for CortexError {
    fn from(err: toml::de::Error) -> Self {
        CortexError::ConfigError {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_error_keeps_code_and_message() {
        let err = CortexError::from_api_error(-32016, "invalid stream");
        assert!(matches!(
            &err,
            CortexError::Rpc { code: -32016, message } if message == "invalid stream"
        ));
        assert_eq!(err.code(), Some(-32016));
        assert_eq!(err.to_string(), "Cortex API error -32016: invalid stream");
    }

    #[test]
    fn test_code_looks_through_wrappers() {
        let auth = CortexError::AuthRpc {
            cause: Box::new(CortexError::from_api_error(-32021, "bad secret")),
        };
        assert_eq!(auth.code(), Some(-32021));

        let exhausted = CortexError::RetryExhausted {
            attempts: 12,
            last_error: Box::new(CortexError::from_api_error(-32152, "not ready")),
        };
        assert_eq!(exhausted.code(), Some(-32152));
        assert!(!exhausted.is_device_busy());

        assert_eq!(CortexError::NotConnected.code(), None);
    }

    #[test]
    fn test_is_device_busy_only_for_headset_not_ready() {
        assert!(CortexError::from_api_error(-32152, "busy").is_device_busy());
        assert!(!CortexError::from_api_error(-32001, "no headset").is_device_busy());
        assert!(!CortexError::Timeout { seconds: 1 }.is_device_busy());
        assert!(!CortexError::ConnectionLost { reason: "x".into() }.is_device_busy());
    }

    #[test]
    fn test_is_token_error() {
        assert!(CortexError::from_api_error(-32014, "invalid token").is_token_error());
        assert!(CortexError::from_api_error(-32015, "expired").is_token_error());
        assert!(CortexError::NotAuthorized.is_token_error());
        assert!(!CortexError::NoSession.is_token_error());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(CortexError::NotConnected.is_connection_error());
        assert!(CortexError::ConnectionLost { reason: "x".into() }.is_connection_error());
        assert!(CortexError::WebSocket("closed".into()).is_connection_error());
        assert!(!CortexError::NoSession.is_connection_error());
        assert!(!CortexError::Timeout { seconds: 1 }.is_connection_error());
    }

    #[test]
    fn test_from_tungstenite_error() {
        let ws_error = tokio_tungstenite::tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ));
        let err: CortexError = ws_error.into();
        assert!(matches!(err, CortexError::WebSocket(_)));
        assert!(err.to_string().contains("WebSocket error"));
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_from_toml_error_conversion() {
        #[derive(Debug, serde::Deserialize)]
        struct DummyConfig {
            _value: String,
        }

        let toml_err = toml::from_str::<DummyConfig>("value = [").unwrap_err();
        let err: CortexError = toml_err.into();
        assert!(matches!(err, CortexError::ConfigError { .. }));
        assert!(err.to_string().contains("Configuration error"));
    }
}

//! Session management protocol types.

use serde::Deserialize;

/// Session status values used by `createSession` / `updateSession`.
///
/// The request side uses `open`/`active`/`close`; responses report
/// `opened`/`activated`/`closed`. Both spellings map onto the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    Active,
    Closed,
}

impl SessionStatus {
    /// The request-side string.
    #[must_use]
    pub fn as_request_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Active => "active",
            SessionStatus::Closed => "close",
        }
    }

    #[must_use]
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "open" | "opened" => Some(SessionStatus::Open),
            "active" | "activated" => Some(SessionStatus::Active),
            "close" | "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }
}

/// Session object returned by `createSession`. Only the fields the bridge
/// reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Session ID (UUID).
    #[serde(alias = "sessionId")]
    pub id: String,

    /// "opened", "activated" or "closed".
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub headset: Option<SessionHeadset>,
}

/// The headset block embedded in a session object.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionHeadset {
    pub id: String,
}

/// A session held by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub headset_id: Option<String>,
}

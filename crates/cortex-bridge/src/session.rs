//! # Session Controller
//!
//! Owns the cortex token and the session, and runs the bootstrap sequence:
//!
//! ```text
//! hasAccessRight ─► (requestAccess) ─► authorize ─► refresh ─► acquire headset
//!      ─► createSession(active), retried while busy ─► (createSession(open))
//!      ─► profile reconciliation (best effort)
//! ```
//!
//! Phases:
//!
//! ```text
//! Unauthenticated ─authorize─► Authorizing ─► Authorized
//!     Authorized ─createSession─► SessionPending ─► SessionActive
//!     (any) ─link closed / clear()─► Unauthenticated
//! ```
//!
//! The token and session are written only here but read from anywhere. A
//! reader that races a disconnect simply sees them gone and reports
//! [`CortexError::NotAuthorized`] / [`CortexError::NoSession`].

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::CortexConfig;
use crate::device::DeviceManager;
use crate::error::{CortexError, CortexResult};
use crate::events::{ConnectionEvent, EventBus, LogLevel};
use crate::protocol::constants::Methods;
use crate::protocol::profiles::{CurrentProfileInfo, ProfileAction};
use crate::protocol::session::{Session, SessionInfo, SessionStatus};
use crate::retry::{RetryPolicy, with_retry};
use crate::rpc::RpcCorrelator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authorizing,
    Authorized,
    SessionPending,
    SessionActive,
}

/// Application credentials sent with `authorize`.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub license: Option<String>,
    pub debit: Option<u32>,
}

impl Credentials {
    #[must_use]
    pub fn from_config(config: &CortexConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            license: config.license.clone(),
            debit: config.debit,
        }
    }

    fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Result of `hasAccessRight`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessRight {
    #[serde(rename = "accessGranted", default)]
    pub access_granted: bool,
    #[serde(default)]
    pub message: String,
}

/// What [`SessionController::prepare`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub session_id: String,
    pub headset_id: String,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    token: Option<String>,
    session: Option<Session>,
}

impl SessionState {
    fn reset(&mut self) {
        self.phase = SessionPhase::Unauthenticated;
        self.token = None;
        self.session = None;
    }
}

pub struct SessionController {
    rpc: Arc<RpcCorrelator>,
    devices: Arc<DeviceManager>,
    bus: EventBus,
    credentials: Credentials,
    session_retry: RetryPolicy,
    state: Arc<RwLock<SessionState>>,
}

impl SessionController {
    /// Build the controller and hook it to link closure, which clears the
    /// token, the session and the known connected headset.
    pub fn new(
        rpc: Arc<RpcCorrelator>,
        devices: Arc<DeviceManager>,
        bus: EventBus,
        credentials: Credentials,
        session_retry: RetryPolicy,
    ) -> Self {
        let state = Arc::new(RwLock::new(SessionState {
            phase: SessionPhase::Unauthenticated,
            token: None,
            session: None,
        }));

        {
            let state = Arc::clone(&state);
            let tracker = Arc::clone(devices.tracker());
            rpc.on_disconnect(Box::new(move |reason: &str| {
                state
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reset();
                tracker.clear();
                tracing::debug!(%reason, "Session state cleared");
            }));
        }

        Self {
            rpc,
            devices,
            bus,
            credentials,
            session_retry,
            state,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── State ──────────────────────────────────────────────────────

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.read().session.clone()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.read().session.as_ref().map(|s| s.id.clone())
    }

    /// Token and session id together, as needed by subscribe/unsubscribe.
    #[must_use]
    pub fn stream_context(&self) -> Option<(String, String)> {
        let state = self.read();
        Some((state.token.clone()?, state.session.as_ref()?.id.clone()))
    }

    /// Forget token and session without talking to the server.
    pub fn clear(&self) {
        self.write().reset();
    }

    // ─── Access / authorization ─────────────────────────────────────

    fn access_params(&self) -> Value {
        json!({
            "clientId": self.credentials.client_id,
            "clientSecret": self.credentials.client_secret,
        })
    }

    /// `hasAccessRight`.
    ///
    /// # Errors
    /// Any RPC error.
    pub async fn has_access_right(&self) -> CortexResult<AccessRight> {
        let result = self
            .rpc
            .call(Methods::HAS_ACCESS_RIGHT, self.access_params())
            .await?;
        serde_json::from_value(result).map_err(|e| CortexError::ProtocolError {
            reason: format!("Failed to parse hasAccessRight result: {e}"),
        })
    }

    /// `requestAccess`. Returns as soon as the request is sent; the user
    /// approves in the EMOTIV Launcher and the caller polls again later.
    ///
    /// # Errors
    /// Any RPC error.
    pub async fn request_access(&self) -> CortexResult<Value> {
        self.rpc
            .call(Methods::REQUEST_ACCESS, self.access_params())
            .await
    }

    /// `authorize`, storing the cortex token. Calling it again refreshes
    /// the token without touching the session.
    ///
    /// # Errors
    /// - [`CortexError::MissingCredentials`] without client id / secret
    /// - [`CortexError::AuthRpc`] wrapping whatever made the call fail
    pub async fn authorize(&self) -> CortexResult<String> {
        if !self.credentials.is_complete() {
            return Err(CortexError::MissingCredentials);
        }

        {
            let mut state = self.write();
            if state.phase == SessionPhase::Unauthenticated {
                state.phase = SessionPhase::Authorizing;
            }
        }

        let mut params = self.access_params();
        if let Some(license) = &self.credentials.license {
            params["license"] = json!(license);
        }
        if let Some(debit) = self.credentials.debit {
            params["debit"] = json!(debit);
        }

        let token = match self.rpc.call(Methods::AUTHORIZE, params).await {
            Ok(result) => result
                .get("cortexToken")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| CortexError::ProtocolError {
                    reason: "authorize response missing cortexToken".into(),
                }),
            Err(e) => Err(e),
        };

        let token = match token {
            Ok(token) => token,
            Err(cause) => {
                let mut state = self.write();
                if state.phase == SessionPhase::Authorizing {
                    state.phase = SessionPhase::Unauthenticated;
                }
                return Err(CortexError::AuthRpc {
                    cause: Box::new(cause),
                });
            }
        };

        {
            let mut state = self.write();
            state.token = Some(token.clone());
            if matches!(
                state.phase,
                SessionPhase::Unauthenticated | SessionPhase::Authorizing
            ) {
                state.phase = SessionPhase::Authorized;
            }
        }

        tracing::info!("Authorized with Cortex");
        self.bus.log(LogLevel::Info, "Authorized with Cortex");
        Ok(token)
    }

    // ─── Sessions ───────────────────────────────────────────────────

    /// `createSession`.
    ///
    /// # Errors
    /// [`CortexError::NotAuthorized`] without a token; otherwise any RPC error.
    pub async fn create_session(
        &self,
        status: SessionStatus,
        headset_id: Option<&str>,
    ) -> CortexResult<Session> {
        let token = {
            let mut state = self.write();
            let token = state.token.clone().ok_or(CortexError::NotAuthorized)?;
            if state.phase == SessionPhase::Authorized {
                state.phase = SessionPhase::SessionPending;
            }
            token
        };

        let mut params = json!({
            "cortexToken": token,
            "status": status.as_request_str(),
        });
        if let Some(id) = headset_id {
            params["headset"] = json!(id);
        }

        let info = match self.rpc.call(Methods::CREATE_SESSION, params).await {
            Ok(result) => serde_json::from_value::<SessionInfo>(result).map_err(|e| {
                CortexError::ProtocolError {
                    reason: format!("Failed to parse session: {e}"),
                }
            }),
            Err(e) => Err(e),
        };
        let info = match info {
            Ok(info) => info,
            Err(e) => {
                let mut state = self.write();
                if state.phase == SessionPhase::SessionPending && state.session.is_none() {
                    state.phase = if state.token.is_some() {
                        SessionPhase::Authorized
                    } else {
                        SessionPhase::Unauthenticated
                    };
                }
                return Err(e);
            }
        };

        let session = Session {
            status: info
                .status
                .as_deref()
                .and_then(SessionStatus::parse)
                .unwrap_or(status),
            headset_id: info
                .headset
                .map(|h| h.id)
                .or_else(|| headset_id.map(str::to_string)),
            id: info.id,
        };

        {
            let mut state = self.write();
            state.phase = if session.status == SessionStatus::Active {
                SessionPhase::SessionActive
            } else {
                SessionPhase::SessionPending
            };
            state.session = Some(session.clone());
        }

        tracing::info!(session_id = %session.id, status = ?session.status, "Session created");
        self.bus
            .log(LogLevel::Info, format!("Session created: {}", session.id));
        self.bus.publish_connection(ConnectionEvent::SessionCreated {
            session_id: session.id.clone(),
            headset_id: session.headset_id.clone(),
        });
        Ok(session)
    }

    /// `createSession`, retried under `policy` while the headset is busy.
    ///
    /// # Errors
    /// The first non-busy error, or [`CortexError::RetryExhausted`].
    pub async fn create_session_with_retry(
        &self,
        status: SessionStatus,
        headset_id: Option<&str>,
        policy: &RetryPolicy,
    ) -> CortexResult<Session> {
        with_retry(policy, || self.create_session(status, headset_id)).await
    }

    /// Close the session if there is one. Server errors are logged and
    /// swallowed; local state is cleared either way.
    pub async fn close_session(&self) {
        let (token, session) = {
            let state = self.read();
            (state.token.clone(), state.session.clone())
        };
        let Some(session) = session else {
            return;
        };

        if let Some(token) = token {
            let params = json!({
                "cortexToken": token,
                "session": session.id,
                "status": SessionStatus::Closed.as_request_str(),
            });
            if let Err(e) = self.rpc.call(Methods::UPDATE_SESSION, params).await {
                tracing::warn!(session_id = %session.id, error = %e, "Failed to close session (ignored)");
            }
        }

        {
            let mut state = self.write();
            state.session = None;
            state.phase = if state.token.is_some() {
                SessionPhase::Authorized
            } else {
                SessionPhase::Unauthenticated
            };
        }

        tracing::info!(session_id = %session.id, "Session closed");
        self.bus.publish_connection(ConnectionEvent::SessionClosed {
            session_id: session.id,
        });
    }

    // ─── Bootstrap ──────────────────────────────────────────────────

    /// Run the whole bootstrap sequence (see the module docs).
    ///
    /// # Errors
    /// Anything from the access check, `authorize`, device acquisition, or
    /// the fallback `createSession("open")`. Profile problems never fail it.
    pub async fn prepare(
        &self,
        headset_id: Option<&str>,
        profile: Option<&str>,
    ) -> CortexResult<Prepared> {
        let access = self.has_access_right().await?;
        if !access.access_granted {
            self.request_access().await?;
            let hint = "Access not granted yet: approve this application in the EMOTIV Launcher, then retry";
            tracing::warn!(message = %access.message, "{hint}");
            self.bus.log(LogLevel::Warn, hint);
        }

        self.authorize().await?;
        self.devices.refresh_best_effort().await;
        let headset_id = self.devices.acquire(headset_id).await?;

        let session = match self
            .create_session_with_retry(SessionStatus::Active, Some(&headset_id), &self.session_retry)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Active session failed, falling back to an open session");
                self.create_session(SessionStatus::Open, Some(&headset_id))
                    .await?
            }
        };

        if let Some(profile) = profile {
            self.reconcile_profile(&headset_id, profile).await;
        }

        Ok(Prepared {
            session_id: session.id,
            headset_id,
        })
    }

    /// Make `profile` the loaded profile of the headset. Never fails.
    pub async fn reconcile_profile(&self, headset_id: &str, profile: &str) {
        if let Err(e) = self.try_reconcile_profile(headset_id, profile).await {
            tracing::warn!(headset_id, profile, error = %e, "Profile load failed (continuing)");
            self.bus
                .log(LogLevel::Warn, format!("Profile '{profile}' not loaded: {e}"));
        }
    }

    async fn try_reconcile_profile(&self, headset_id: &str, profile: &str) -> CortexResult<()> {
        let token = self.token().ok_or(CortexError::NotAuthorized)?;

        let current = self
            .rpc
            .call(
                Methods::GET_CURRENT_PROFILE,
                json!({ "cortexToken": token, "headset": headset_id }),
            )
            .await?;
        let current: CurrentProfileInfo =
            serde_json::from_value(current).map_err(|e| CortexError::ProtocolError {
                reason: format!("Failed to parse current profile: {e}"),
            })?;

        if current.is_loaded(profile) {
            tracing::debug!(profile, "Profile already loaded");
            return Ok(());
        }

        if let Some(loaded) = current.name.as_deref() {
            self.setup_profile(&token, headset_id, loaded, ProfileAction::Unload)
                .await?;
        }
        self.setup_profile(&token, headset_id, profile, ProfileAction::Load)
            .await?;

        tracing::info!(headset_id, profile, "Profile loaded");
        self.bus
            .log(LogLevel::Info, format!("Profile loaded: {profile}"));
        Ok(())
    }

    async fn setup_profile(
        &self,
        token: &str,
        headset_id: &str,
        profile: &str,
        action: ProfileAction,
    ) -> CortexResult<Value> {
        self.rpc
            .call(
                Methods::SETUP_PROFILE,
                json!({
                    "cortexToken": token,
                    "headset": headset_id,
                    "profile": profile,
                    "status": action.as_str(),
                }),
            )
            .await
    }
}

//! # Cortex Client
//!
//! The façade a host application talks to. It owns one connection and the
//! components layered on it:
//!
//! ```text
//! ┌──────────────────────── CortexClient ────────────────────────┐
//! │                                                              │
//! │  SessionController ──┐      SubscriptionEngine ──┐           │
//! │  DeviceManager ──────┼──► RpcCorrelator ──► Transport ◄──►  Cortex
//! │                      │          │                            │
//! │                      │          └─► Demux ──► EventBus ──► host
//! │  warning watcher ◄───┴────────────────────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`CortexClient::new`] does no I/O. [`CortexClient::connect`] opens the
//! link and starts the warning watcher, which applies the device side
//! effects of Cortex warnings (headset connected, scan finished).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config::CortexConfig;
use crate::device::{AcquirePolicy, DeviceManager};
use crate::error::{CortexError, CortexResult};
use crate::events::{ConnectionEvent, EventBus, LogLevel};
use crate::protocol::auth::UserLoginInfo;
use crate::protocol::constants::Methods;
use crate::protocol::headset::{DeviceCommand, HeadsetInfo};
use crate::rpc::RpcCorrelator;
use crate::session::{Credentials, Prepared, SessionController};
use crate::subscription::{StreamSubscriptionResult, SubscriptionEngine};
use crate::transport::{ConnectionState, TransportSettings};

pub struct CortexClient {
    config: CortexConfig,
    bus: EventBus,
    rpc: Arc<RpcCorrelator>,
    devices: Arc<DeviceManager>,
    session: Arc<SessionController>,
    subscriptions: SubscriptionEngine,
    /// Serialises `ensure_ready_for_streams` so concurrent first holders
    /// bootstrap only once.
    bootstrap: tokio::sync::Mutex<()>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl CortexClient {
    /// Build every component from `config`. Nothing is connected yet.
    #[must_use]
    pub fn new(config: CortexConfig) -> Self {
        Self::with_event_bus(config, EventBus::default())
    }

    /// Like [`Self::new`], publishing onto an existing bus.
    #[must_use]
    pub fn with_event_bus(config: CortexConfig, bus: EventBus) -> Self {
        let rpc = Arc::new(RpcCorrelator::new(
            TransportSettings::from_config(&config),
            std::time::Duration::from_secs(config.timeouts.rpc_timeout_secs),
            bus.clone(),
        ));
        let devices = Arc::new(DeviceManager::new(
            Arc::clone(&rpc),
            AcquirePolicy::from_config(&config),
        ));
        let session = Arc::new(SessionController::new(
            Arc::clone(&rpc),
            Arc::clone(&devices),
            bus.clone(),
            Credentials::from_config(&config),
            config.retry.session_policy(),
        ));
        let subscriptions =
            SubscriptionEngine::new(Arc::clone(&rpc), Arc::clone(&session), bus.clone());

        Self {
            config,
            bus,
            rpc,
            devices,
            session,
            subscriptions,
            bootstrap: tokio::sync::Mutex::new(()),
            watcher: Mutex::new(None),
        }
    }

    fn watcher(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &CortexConfig {
        &self.config
    }

    /// The bus every event of this client is published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    #[must_use]
    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    // ─── Connection ─────────────────────────────────────────────────────

    /// Open the connection. A no-op when it is already open.
    ///
    /// # Errors
    /// [`CortexError::ConnectionFailed`] or [`CortexError::Timeout`] when
    /// the service cannot be reached.
    pub async fn connect(&self) -> CortexResult<()> {
        if self.rpc.is_open() {
            return Ok(());
        }

        self.start_warning_watcher();
        self.rpc.open().await?;

        tracing::info!(url = %self.rpc.url(), "Connected to Cortex");
        self.bus
            .log(LogLevel::Info, format!("Connected to {}", self.rpc.url()));
        self.bus.publish_connection(ConnectionEvent::Connected {
            url: self.rpc.url().to_string(),
        });
        Ok(())
    }

    fn start_warning_watcher(&self) {
        let mut watcher = self.watcher();
        if watcher.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let mut warnings = self.bus.warnings();
        let devices = Arc::clone(&self.devices);
        *watcher = Some(tokio::spawn(async move {
            loop {
                match warnings.recv().await {
                    Ok(warning) => devices.on_warning(&warning).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Warning watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Close the session (best effort) and the connection. Safe to call
    /// when already disconnected.
    pub async fn disconnect(&self) {
        if self.rpc.is_open() {
            self.session.close_session().await;
        }
        self.rpc.close().await;
        if let Some(handle) = self.watcher().take() {
            handle.abort();
        }
        self.session.clear();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.rpc.is_open()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.rpc.state()
    }

    // ─── Bootstrap ──────────────────────────────────────────────────────

    /// Run the full bootstrap for `headset_id` / `profile`.
    ///
    /// # Errors
    /// See [`SessionController::prepare`].
    pub async fn prepare(
        &self,
        headset_id: Option<&str>,
        profile: Option<&str>,
    ) -> CortexResult<Prepared> {
        self.connect().await?;
        self.session.prepare(headset_id, profile).await
    }

    /// Return the live session, bootstrapping one with the configured
    /// headset and profile if there is none. Concurrent callers wait for a
    /// single bootstrap.
    ///
    /// # Errors
    /// See [`SessionController::prepare`].
    pub async fn ensure_ready_for_streams(&self) -> CortexResult<Prepared> {
        let _bootstrap = self.bootstrap.lock().await;

        if self.rpc.is_open() {
            if let Some(session) = self.session.session() {
                if self.session.token().is_some() {
                    let headset_id = session
                        .headset_id
                        .or_else(|| self.devices.tracker().connected())
                        .unwrap_or_default();
                    return Ok(Prepared {
                        session_id: session.id,
                        headset_id,
                    });
                }
            }
        }

        self.prepare(self.config.headset_id.as_deref(), self.config.profile.as_deref())
            .await
    }

    // ─── Streams ────────────────────────────────────────────────────────

    /// # Errors
    /// See [`SubscriptionEngine::subscribe`].
    pub async fn subscribe(&self, streams: &[&str]) -> CortexResult<StreamSubscriptionResult> {
        self.subscriptions.subscribe(streams).await
    }

    /// # Errors
    /// See [`SubscriptionEngine::unsubscribe`].
    pub async fn unsubscribe(&self, streams: &[&str]) -> CortexResult<StreamSubscriptionResult> {
        self.subscriptions.unsubscribe(streams).await
    }

    /// Subscribe under the configured subscribe retry policy.
    ///
    /// # Errors
    /// See [`SubscriptionEngine::subscribe_with_retry`].
    pub async fn subscribe_with_retry(
        &self,
        streams: &[&str],
    ) -> CortexResult<StreamSubscriptionResult> {
        self.subscriptions
            .subscribe_with_retry(streams, &self.config.retry.subscribe_policy())
            .await
    }

    // ─── Headsets ───────────────────────────────────────────────────────

    /// # Errors
    /// Any RPC error.
    pub async fn query_headsets(&self) -> CortexResult<Vec<HeadsetInfo>> {
        self.devices.query_headsets().await
    }

    /// # Errors
    /// Any RPC error.
    pub async fn control_device(
        &self,
        command: DeviceCommand,
        headset_id: Option<&str>,
    ) -> CortexResult<Value> {
        self.devices.control_device(command, headset_id).await
    }

    /// # Errors
    /// Any RPC error.
    pub async fn refresh_headsets(&self) -> CortexResult<()> {
        self.devices.refresh().await
    }

    /// Drive a headset to `connected` without creating a session.
    ///
    /// # Errors
    /// See [`DeviceManager::acquire`].
    pub async fn acquire_headset(&self, preferred: Option<&str>) -> CortexResult<String> {
        self.devices.acquire(preferred).await
    }

    // ─── Account ────────────────────────────────────────────────────────

    /// `getCortexInfo`. Needs no authorization.
    ///
    /// # Errors
    /// Any RPC error.
    pub async fn get_cortex_info(&self) -> CortexResult<Value> {
        self.rpc.call(Methods::GET_CORTEX_INFO, json!({})).await
    }

    /// The Emotiv users logged in to the Launcher.
    ///
    /// # Errors
    /// Any RPC error.
    pub async fn get_user_login(&self) -> CortexResult<Vec<UserLoginInfo>> {
        let result = self.rpc.call(Methods::GET_USER_LOGIN, json!({})).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(result).map_err(|e| CortexError::ProtocolError {
            reason: format!("Failed to parse user login info: {e}"),
        })
    }

    /// `getUserInformation`, authorizing first if needed.
    ///
    /// # Errors
    /// Authorization or RPC errors.
    pub async fn get_user_information(&self) -> CortexResult<Value> {
        self.call_with_token(Methods::GET_USER_INFO, |token| json!({ "cortexToken": token }))
            .await
    }

    /// `getLicenseInfo`, authorizing first if needed.
    ///
    /// # Errors
    /// Authorization or RPC errors.
    pub async fn get_license_info(&self) -> CortexResult<Value> {
        self.call_with_token(Methods::GET_LICENSE_INFO, |token| {
            let mut params = json!({
                "cortexToken": token,
                "clientId": self.config.client_id,
            });
            if let Some(license) = &self.config.license {
                params["license"] = json!(license);
            }
            params
        })
        .await
    }

    async fn ensure_token(&self) -> CortexResult<String> {
        match self.session.token() {
            Some(token) => Ok(token),
            None => self.session.authorize().await,
        }
    }

    /// Call `method` with the current token. A rejected or expired token is
    /// replaced by one fresh `authorize` and the call is sent once more.
    async fn call_with_token(
        &self,
        method: &'static str,
        params: impl Fn(&str) -> Value,
    ) -> CortexResult<Value> {
        let token = self.ensure_token().await?;
        match self.rpc.call(method, params(&token)).await {
            Err(e) if e.is_token_error() => {
                tracing::warn!(method, error = %e, "Token rejected, re-authorizing");
                let token = self.session.authorize().await?;
                self.rpc.call(method, params(&token)).await
            }
            result => result,
        }
    }
}

impl Drop for CortexClient {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher().take() {
            handle.abort();
        }
    }
}

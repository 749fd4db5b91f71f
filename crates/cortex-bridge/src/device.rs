//! # Device Acquisition
//!
//! Headset discovery and the polling loop that drives a headset to
//! `connected`. The target is the preferred headset when it is listed,
//! else the first connected one, else the first one listed.
//!
//! | Target state | Action before the next poll |
//! |--------------|-----------------------------|
//! | none listed | `controlDevice("refresh")`, best effort |
//! | `discovered` | `controlDevice("connect")`, best effort |
//! | `connecting` / other | nothing, just wait |
//! | `connected` | done |
//!
//! Polling alone is enough to make progress. Warning 104 (headset
//! connected) only cuts the current wait short through [`DeviceTracker`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::config::CortexConfig;
use crate::error::{CortexError, CortexResult};
use crate::protocol::constants::{Methods, WarningCodes};
use crate::protocol::headset::{DeviceCommand, HeadsetInfo, HeadsetStatus};
use crate::protocol::rpc::Warning;
use crate::rpc::RpcCorrelator;

/// Budget of the acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquirePolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Wall-clock cap over the whole loop.
    pub overall_timeout: Duration,
}

impl AcquirePolicy {
    #[must_use]
    pub fn from_config(config: &CortexConfig) -> Self {
        Self {
            max_attempts: config.device.max_attempts,
            poll_interval: config.device.poll_interval(),
            overall_timeout: Duration::from_secs(config.timeouts.headset_connect_timeout_secs),
        }
    }
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self::from_config(&CortexConfig::new("", ""))
    }
}

/// Last headset Cortex announced as connected.
#[derive(Debug, Default)]
pub struct DeviceTracker {
    connected: RwLock<Option<String>>,
    notify: Notify,
}

impl DeviceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_connected(&self, headset_id: impl Into<String>) {
        *self
            .connected
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(headset_id.into());
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn connected(&self) -> Option<String> {
        self.connected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self
            .connected
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Sleep up to `interval`; returns `true` if a connect notification
    /// ended the wait early.
    pub async fn wait(&self, interval: Duration) -> bool {
        tokio::time::timeout(interval, self.notify.notified())
            .await
            .is_ok()
    }
}

/// The headset to work on: the preferred one if it is listed, otherwise the
/// first connected headset, otherwise the first listed.
#[must_use]
pub fn select_target<'a>(
    headsets: &'a [HeadsetInfo],
    preferred: Option<&str>,
) -> Option<&'a HeadsetInfo> {
    preferred
        .and_then(|id| headsets.iter().find(|h| h.id == id))
        .or_else(|| headsets.iter().find(|h| h.is_connected()))
        .or_else(|| headsets.first())
}

/// Headset queries and control on top of the correlator.
pub struct DeviceManager {
    rpc: Arc<RpcCorrelator>,
    tracker: Arc<DeviceTracker>,
    policy: AcquirePolicy,
}

impl DeviceManager {
    pub fn new(rpc: Arc<RpcCorrelator>, policy: AcquirePolicy) -> Self {
        Self {
            rpc,
            tracker: Arc::new(DeviceTracker::new()),
            policy,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<DeviceTracker> {
        &self.tracker
    }

    /// `queryHeadsets`. A `null` result is an empty list.
    ///
    /// # Errors
    /// Any RPC error, or [`CortexError::ProtocolError`] for an unparseable list.
    pub async fn query_headsets(&self) -> CortexResult<Vec<HeadsetInfo>> {
        let result = self.rpc.call(Methods::QUERY_HEADSETS, json!({})).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(result).map_err(|e| CortexError::ProtocolError {
            reason: format!("Failed to parse headset list: {e}"),
        })
    }

    /// `controlDevice` with an optional headset id.
    ///
    /// # Errors
    /// Any RPC error.
    pub async fn control_device(
        &self,
        command: DeviceCommand,
        headset_id: Option<&str>,
    ) -> CortexResult<Value> {
        let mut params = json!({ "command": command.as_str() });
        if let Some(id) = headset_id {
            params["headset"] = json!(id);
        }
        tracing::debug!(command = command.as_str(), headset = ?headset_id, "controlDevice");
        self.rpc.call(Methods::CONTROL_DEVICE, params).await
    }

    /// Ask Cortex to rescan for headsets.
    ///
    /// # Errors
    /// Any RPC error.
    pub async fn refresh(&self) -> CortexResult<()> {
        self.control_device(DeviceCommand::Refresh, None).await?;
        Ok(())
    }

    pub(crate) async fn refresh_best_effort(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Headset refresh failed (continuing)");
        }
    }

    /// Poll until the target headset is connected and return its id.
    ///
    /// # Errors
    /// - [`CortexError::NoConnectedDevice`] when the attempts run out
    /// - [`CortexError::Timeout`] when the overall budget runs out first
    /// - any error from `queryHeadsets`
    pub async fn acquire(&self, preferred: Option<&str>) -> CortexResult<String> {
        let budget = self.policy.overall_timeout;
        tokio::time::timeout(budget, self.acquire_loop(preferred))
            .await
            .map_err(|_| CortexError::Timeout {
                seconds: budget.as_secs(),
            })?
    }

    async fn acquire_loop(&self, preferred: Option<&str>) -> CortexResult<String> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let headsets = self.query_headsets().await?;

            match select_target(&headsets, preferred) {
                Some(headset) if headset.is_connected() => {
                    self.tracker.mark_connected(headset.id.clone());
                    tracing::info!(headset_id = %headset.id, attempt, "Headset connected");
                    return Ok(headset.id.clone());
                }
                Some(headset) if headset.status == HeadsetStatus::Discovered => {
                    tracing::info!(headset_id = %headset.id, "Connecting headset");
                    if let Err(e) = self
                        .control_device(DeviceCommand::Connect, Some(&headset.id))
                        .await
                    {
                        tracing::warn!(headset_id = %headset.id, error = %e, "Headset connect request failed (continuing)");
                    }
                }
                Some(headset) => {
                    tracing::debug!(headset_id = %headset.id, status = %headset.status, "Waiting for headset");
                }
                None => {
                    tracing::debug!(attempt, "No target headset listed, refreshing");
                    self.refresh_best_effort().await;
                }
            }

            if attempt < attempts {
                self.tracker.wait(self.policy.poll_interval).await;
            }
        }

        tracing::warn!(attempts, "No connected headset");
        Err(CortexError::NoConnectedDevice { attempts })
    }

    /// Warning side effects: 104 records the connected headset, 142
    /// triggers a best-effort rescan while nothing is known connected.
    pub async fn on_warning(&self, warning: &Warning) {
        match warning.code {
            WarningCodes::HEADSET_CONNECTED => {
                if let Some(id) = warning.headset_id() {
                    self.tracker.mark_connected(id);
                }
            }
            WarningCodes::HEADSET_SCANNING_FINISHED if self.tracker.connected().is_none() => {
                self.refresh_best_effort().await;
            }
            _ => {}
        }
    }
}

//! # Stream Hub
//!
//! Ties stream leases to Cortex subscriptions: the first holder of a stream
//! bootstraps the session if needed and subscribes; the last one to leave
//! (by [`StreamHub::stop`] or by expiry) unsubscribes.
//!
//! Every lease change on a stream and the RPC it triggers run under that
//! stream's gate. A `stop` issued while the first holder's subscribe is in
//! flight waits for it, and a holder arriving meanwhile sees the outcome
//! (and subscribes itself if the first attempt was rolled back).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::client::CortexClient;
use crate::error::{CortexError, CortexResult};
use crate::events::LogLevel;
use crate::stream_refs::{HolderId, StartOutcome, StopOutcome, StreamRefManager, StreamRefStatus};
use crate::subscription::StreamStatus;

type Gate = Arc<tokio::sync::Mutex<()>>;

pub struct StreamHub {
    client: Arc<CortexClient>,
    refs: StreamRefManager,
    default_ttl: Duration,
    gates: Mutex<HashMap<String, Gate>>,
}

impl StreamHub {
    /// A hub whose default lease is the configured holder TTL.
    #[must_use]
    pub fn new(client: Arc<CortexClient>) -> Self {
        let default_ttl = client.config().streams.holder_ttl();
        Self {
            client,
            refs: StreamRefManager::new(),
            default_ttl,
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn gate(&self, stream: &str) -> Gate {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(stream.to_string()).or_default())
    }

    #[must_use]
    pub fn client(&self) -> &Arc<CortexClient> {
        &self.client
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Take a lease on `stream` for `holder`. The first holder triggers the
    /// bootstrap and the subscription; if either fails the lease is undone.
    ///
    /// # Errors
    /// Bootstrap errors, RPC errors, or [`CortexError::Rpc`] carrying the
    /// server's per-stream rejection.
    pub async fn start(
        &self,
        stream: &str,
        holder: impl Into<HolderId>,
        ttl: Option<Duration>,
    ) -> CortexResult<StartOutcome> {
        let holder = holder.into();
        let gate = self.gate(stream);
        let _transition = gate.lock().await;

        let outcome = self
            .refs
            .start(stream, holder.clone(), ttl.unwrap_or(self.default_ttl));
        if !outcome.first {
            return Ok(outcome);
        }

        if let Err(e) = self.subscribe_one(stream).await {
            self.refs.stop(stream, holder);
            tracing::warn!(stream, error = %e, "Subscribe failed, lease released");
            return Err(e);
        }

        tracing::info!(stream, holder = %holder, "Stream started");
        Ok(outcome)
    }

    async fn subscribe_one(&self, stream: &str) -> CortexResult<()> {
        self.client.ensure_ready_for_streams().await?;
        let result = self.client.subscribe_with_retry(&[stream]).await?;
        match result.get(stream).map(|o| &o.status) {
            Some(StreamStatus::Success { .. }) => Ok(()),
            Some(StreamStatus::Failure { code, message }) => Err(CortexError::Rpc {
                code: *code,
                message: message.clone(),
            }),
            None => Err(CortexError::ProtocolError {
                reason: format!("subscribe result does not mention stream '{stream}'"),
            }),
        }
    }

    /// Release `holder`'s lease; unsubscribes once nobody holds the stream.
    ///
    /// # Errors
    /// Errors from `unsubscribe`. The lease is released regardless.
    pub async fn stop(&self, stream: &str, holder: impl Into<HolderId>) -> CortexResult<StopOutcome> {
        let gate = self.gate(stream);
        let _transition = gate.lock().await;

        let outcome = self.refs.stop(stream, holder);
        if outcome.empty && outcome.removed {
            self.client.unsubscribe(&[stream]).await?;
            tracing::info!(stream, "Stream stopped");
        }
        Ok(outcome)
    }

    /// Extend an existing lease. `None` if the holder has no live lease.
    pub fn renew(
        &self,
        stream: &str,
        holder: impl Into<HolderId>,
        ttl: Option<Duration>,
    ) -> Option<usize> {
        self.refs
            .renew(stream, holder, ttl.unwrap_or(self.default_ttl))
    }

    /// Drop expired leases and unsubscribe every stream left without a
    /// holder, returning those streams. A stream that gained a new holder
    /// before its gate was taken stays subscribed and is not returned.
    /// Unsubscribe failures are logged, not returned.
    pub async fn prune_expired(&self) -> Vec<String> {
        let emptied = self.refs.prune(Instant::now());
        if emptied.is_empty() {
            return emptied;
        }

        // `emptied` is sorted, so gates are always taken in the same order.
        let gates: Vec<Gate> = emptied.iter().map(|stream| self.gate(stream)).collect();
        let mut held = Vec::with_capacity(gates.len());
        for gate in &gates {
            held.push(gate.lock().await);
        }

        let emptied: Vec<String> = emptied
            .into_iter()
            .filter(|stream| !self.refs.is_active(stream))
            .collect();
        if emptied.is_empty() {
            return emptied;
        }

        tracing::info!(streams = ?emptied, "Leases expired");
        let names: Vec<&str> = emptied.iter().map(String::as_str).collect();
        match self.client.unsubscribe(&names).await {
            Ok(_) | Err(CortexError::NoSession) => {}
            Err(e) => {
                tracing::warn!(streams = ?emptied, error = %e, "Unsubscribe of expired streams failed");
                self.client.events().log(
                    LogLevel::Warn,
                    format!("Unsubscribe of expired streams {emptied:?} failed: {e}"),
                );
            }
        }
        emptied
    }

    #[must_use]
    pub fn status(&self) -> Vec<StreamRefStatus> {
        self.refs.status()
    }

    #[must_use]
    pub fn count(&self, stream: &str) -> usize {
        self.refs.count(stream)
    }

    /// Run [`Self::prune_expired`] every `interval` until the hub is dropped.
    pub fn spawn_pruner(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let hub: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(hub) = hub.upgrade() else {
                    break;
                };
                hub.prune_expired().await;
            }
        })
    }
}

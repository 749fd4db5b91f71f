//! # RPC Correlator
//!
//! Numbers outbound requests and matches each response back to its caller
//! by `id`, so responses may arrive in any order and interleaved with
//! stream data.
//!
//! Guarantees:
//! - A call made while the link is not open fails at once with
//!   [`CortexError::NotConnected`].
//! - A server `error` object becomes [`CortexError::Rpc`] with the numeric
//!   code intact.
//! - When the link closes, every outstanding call fails with
//!   [`CortexError::ConnectionLost`]; nothing waits forever.
//! - A call that outlives the RPC timeout, or whose future is dropped,
//!   removes its own pending entry.
//!
//! Messages without a pending `id` go to the [`Demux`] untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::demux::Demux;
use crate::error::{CortexError, CortexResult};
use crate::events::{ConnectionEvent, EventBus};
use crate::protocol::rpc::{CortexRequest, CortexResponse};
use crate::transport::{ConnectionState, InboundHandler, Transport, TransportSettings};

/// Callback run when the link closes, with the close reason.
pub type DisconnectHook = Box<dyn Fn(&str) + Send + Sync>;

struct PendingRequest {
    method: &'static str,
    params: Value,
    created_at: Instant,
    tx: oneshot::Sender<CortexResult<Value>>,
}

struct Shared {
    pending: Mutex<HashMap<u64, PendingRequest>>,
    disconnect_hooks: Mutex<Vec<DisconnectHook>>,
    demux: Demux,
    bus: EventBus,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn resolve(id: u64, request: PendingRequest, message: Value) {
        let outcome = match serde_json::from_value::<CortexResponse>(message) {
            Ok(CortexResponse {
                error: Some(error), ..
            }) => {
                tracing::error!(
                    id,
                    method = request.method,
                    code = error.code,
                    message = %error.message,
                    "Cortex API error in RPC response",
                );
                Err(CortexError::from_api_error(error.code, error.message))
            }
            Ok(response) => Ok(response.result.unwrap_or(Value::Null)),
            Err(e) => Err(CortexError::ProtocolError {
                reason: format!("Failed to parse RPC response: {e}"),
            }),
        };

        tracing::debug!(
            id,
            method = request.method,
            elapsed_ms = u64::try_from(request.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = outcome.is_ok(),
            "Cortex RPC completed"
        );
        let _ = request.tx.send(outcome);
    }
}

/// The transport's inbound handler: responses to their callers, the rest
/// to the demultiplexer.
struct Dispatcher {
    shared: Arc<Shared>,
}

impl InboundHandler for Dispatcher {
    fn on_message(&self, message: Value) {
        if let Some(id) = message.get("id").and_then(Value::as_u64) {
            let pending = lock(&self.shared.pending).remove(&id);
            if let Some(request) = pending {
                Shared::resolve(id, request, message);
                return;
            }
        }
        self.shared.demux.dispatch(message);
    }

    fn on_close(&self, reason: &str) {
        let orphaned: Vec<(u64, PendingRequest)> = lock(&self.shared.pending).drain().collect();
        if !orphaned.is_empty() {
            tracing::warn!(count = orphaned.len(), %reason, "Failing pending Cortex requests");
        }
        for (id, request) in orphaned {
            tracing::debug!(id, method = request.method, params = %request.params, "Request orphaned");
            let _ = request.tx.send(Err(CortexError::ConnectionLost {
                reason: reason.to_string(),
            }));
        }

        for hook in lock(&self.shared.disconnect_hooks).iter() {
            hook(reason);
        }

        self.shared.bus.publish_connection(ConnectionEvent::Disconnected {
            reason: reason.to_string(),
        });
    }
}

/// Removes the pending entry if the call does not complete normally.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.shared.pending).remove(&self.id);
    }
}

/// JSON-RPC over the [`Transport`].
pub struct RpcCorrelator {
    transport: Transport,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    rpc_timeout: Duration,
}

impl RpcCorrelator {
    /// Build the correlator and its transport. No I/O happens here.
    pub fn new(settings: TransportSettings, rpc_timeout: Duration, bus: EventBus) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            disconnect_hooks: Mutex::new(Vec::new()),
            demux: Demux::new(bus.clone()),
            bus,
        });
        let dispatcher = Arc::new(Dispatcher {
            shared: Arc::clone(&shared),
        });

        Self {
            transport: Transport::new(settings, dispatcher),
            shared,
            next_id: AtomicU64::new(1),
            rpc_timeout,
        }
    }

    /// Open the link (no-op when already open).
    ///
    /// # Errors
    /// Any connection error from [`Transport::open`].
    pub async fn open(&self) -> CortexResult<()> {
        self.transport.open().await
    }

    /// Close the link. Pending calls fail and disconnect hooks run.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.transport.url()
    }

    /// Register a callback for link closure. Hooks run on whatever task
    /// notices the close and must not block.
    pub fn on_disconnect(&self, hook: DisconnectHook) {
        lock(&self.shared.disconnect_hooks).push(hook);
    }

    /// Number of calls waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Send a request and wait for its response.
    ///
    /// # Errors
    /// - [`CortexError::NotConnected`] if the link is not open
    /// - [`CortexError::Rpc`] for a server-reported error
    /// - [`CortexError::ConnectionLost`] if the link closes first
    /// - [`CortexError::Timeout`] after the RPC timeout
    pub async fn call(&self, method: &'static str, params: Value) -> CortexResult<Value> {
        if !self.transport.is_open() {
            return Err(CortexError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CortexRequest::new(id, method, params.clone());
        let json = serde_json::to_string(&request).map_err(|e| CortexError::ProtocolError {
            reason: format!("serialize error: {e}"),
        })?;

        tracing::debug!(method, id, "Sending Cortex request");

        let (tx, rx) = oneshot::channel();
        lock(&self.shared.pending).insert(
            id,
            PendingRequest {
                method,
                params,
                created_at: Instant::now(),
                tx,
            },
        );
        let _guard = PendingGuard {
            shared: &self.shared,
            id,
        };

        self.transport.send(json).await?;

        match tokio::time::timeout(self.rpc_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CortexError::ConnectionLost {
                reason: "response channel dropped".into(),
            }),
            Err(_) => {
                tracing::warn!(method, id, "Cortex RPC timed out");
                Err(CortexError::Timeout {
                    seconds: self.rpc_timeout.as_secs(),
                })
            }
        }
    }
}

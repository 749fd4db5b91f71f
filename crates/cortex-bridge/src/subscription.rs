//! # Stream Subscription Engine
//!
//! `subscribe` / `unsubscribe` for a list of stream names in one RPC. The
//! server answers with parallel `success` / `failure` arrays; every entry
//! is reported on the [`EventBus`] and in the returned
//! [`StreamSubscriptionResult`]. A failed stream never aborts the others.
//!
//! Column labels are derived from a successful `subscribe`:
//!
//! | stream | labels |
//! |--------|--------|
//! | `eeg` | `cols` without the trailing marker column |
//! | `dev` | the nested array at index 2, else `cols` as given |
//! | `com`, `fac` | none |
//! | other | `cols` as given |

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{CortexError, CortexResult};
use crate::events::{EventBus, LogLevel};
use crate::protocol::constants::{Methods, Streams};
use crate::protocol::streams::SubscribeResponse;
use crate::retry::{RetryPolicy, with_retry};
use crate::rpc::RpcCorrelator;
use crate::session::SessionController;

/// What happened to one stream of a subscribe/unsubscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Success { columns: Vec<String> },
    Failure { code: i32, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub name: String,
    pub status: StreamStatus,
}

impl StreamOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, StreamStatus::Success { .. })
    }
}

/// Per-stream outcome of one subscribe/unsubscribe call, successes first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSubscriptionResult {
    pub per_stream: Vec<StreamOutcome>,
}

impl StreamSubscriptionResult {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StreamOutcome> {
        self.per_stream.iter().find(|o| o.name == name)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.per_stream
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.name.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &StreamOutcome> {
        self.per_stream.iter().filter(|o| !o.is_success())
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.per_stream.iter().all(StreamOutcome::is_success)
    }
}

fn column_name(column: &Value) -> String {
    match column {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Column labels for a freshly subscribed stream, or `None` when the stream
/// carries none worth publishing.
#[must_use]
pub fn derive_labels(stream: &str, cols: &[Value]) -> Option<Vec<String>> {
    if Streams::CLASSIFIERS.contains(&stream) {
        return None;
    }

    let labels = match stream {
        Streams::EEG => {
            let keep = cols.len().saturating_sub(1);
            cols[..keep].iter().map(column_name).collect()
        }
        Streams::DEV => match cols.get(2) {
            Some(Value::Array(nested)) => nested.iter().map(column_name).collect(),
            _ => cols.iter().map(column_name).collect(),
        },
        _ => cols.iter().map(column_name).collect(),
    };
    Some(labels)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Subscribe,
    Unsubscribe,
}

impl Direction {
    fn method(self) -> &'static str {
        match self {
            Direction::Subscribe => Methods::SUBSCRIBE,
            Direction::Unsubscribe => Methods::UNSUBSCRIBE,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Direction::Subscribe => "Subscribed",
            Direction::Unsubscribe => "Unsubscribed",
        }
    }
}

pub struct SubscriptionEngine {
    rpc: Arc<RpcCorrelator>,
    session: Arc<SessionController>,
    bus: EventBus,
}

impl SubscriptionEngine {
    pub fn new(rpc: Arc<RpcCorrelator>, session: Arc<SessionController>, bus: EventBus) -> Self {
        Self { rpc, session, bus }
    }

    /// Subscribe the current session to `streams`.
    ///
    /// # Errors
    /// [`CortexError::NoSession`] without a token and session; any RPC
    /// error. Per-stream rejections are not errors.
    pub async fn subscribe(&self, streams: &[&str]) -> CortexResult<StreamSubscriptionResult> {
        self.send(Direction::Subscribe, streams).await
    }

    /// # Errors
    /// Same as [`Self::subscribe`].
    pub async fn unsubscribe(&self, streams: &[&str]) -> CortexResult<StreamSubscriptionResult> {
        self.send(Direction::Unsubscribe, streams).await
    }

    /// [`Self::subscribe`], retried under `policy` while the headset is busy.
    ///
    /// # Errors
    /// The first non-busy error, or [`CortexError::RetryExhausted`].
    pub async fn subscribe_with_retry(
        &self,
        streams: &[&str],
        policy: &RetryPolicy,
    ) -> CortexResult<StreamSubscriptionResult> {
        with_retry(policy, || self.subscribe(streams)).await
    }

    async fn send(
        &self,
        direction: Direction,
        streams: &[&str],
    ) -> CortexResult<StreamSubscriptionResult> {
        let (token, session_id) = self.session.stream_context().ok_or(CortexError::NoSession)?;

        let result = self
            .rpc
            .call(
                direction.method(),
                json!({
                    "cortexToken": token,
                    "session": session_id,
                    "streams": streams,
                }),
            )
            .await?;

        let response: SubscribeResponse = if result.is_null() {
            SubscribeResponse::default()
        } else {
            serde_json::from_value(result).map_err(|e| CortexError::ProtocolError {
                reason: format!("Failed to parse {} result: {e}", direction.method()),
            })?
        };

        Ok(self.report(direction, response))
    }

    fn report(&self, direction: Direction, response: SubscribeResponse) -> StreamSubscriptionResult {
        let mut per_stream = Vec::with_capacity(response.success.len() + response.failure.len());

        for success in response.success {
            let cols = success.cols.unwrap_or_default();
            tracing::info!(stream = %success.stream_name, "{} to stream", direction.verb());
            self.bus.log(
                LogLevel::Info,
                format!("{} to stream: {}", direction.verb(), success.stream_name),
            );

            if direction == Direction::Subscribe {
                if let Some(labels) = derive_labels(&success.stream_name, &cols) {
                    self.bus.publish_labels(success.stream_name.clone(), labels);
                }
            }

            per_stream.push(StreamOutcome {
                name: success.stream_name,
                status: StreamStatus::Success {
                    columns: cols.iter().map(column_name).collect(),
                },
            });
        }

        for failure in response.failure {
            tracing::warn!(
                stream = %failure.stream_name,
                code = failure.code,
                message = %failure.message,
                "Stream {} failed",
                direction.method(),
            );
            self.bus.log(
                LogLevel::Error,
                format!(
                    "Stream {} failed: {} ({})",
                    direction.method(),
                    failure.stream_name,
                    failure.message
                ),
            );
            per_stream.push(StreamOutcome {
                name: failure.stream_name,
                status: StreamStatus::Failure {
                    code: failure.code,
                    message: failure.message,
                },
            });
        }

        StreamSubscriptionResult { per_stream }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eeg_drops_marker_column() {
        let cols = vec![json!("AF3"), json!("F7"), json!("MARKERS")];
        assert_eq!(derive_labels("eeg", &cols).unwrap(), vec!["AF3", "F7"]);
        assert_eq!(derive_labels("eeg", &[]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_dev_uses_nested_array() {
        let cols = vec![
            json!("Battery"),
            json!("Signal"),
            json!(["AF3", "F7", "OVERALL"]),
        ];
        assert_eq!(
            derive_labels("dev", &cols).unwrap(),
            vec!["AF3", "F7", "OVERALL"]
        );

        let flat = vec![json!("Battery"), json!("Signal")];
        assert_eq!(derive_labels("dev", &flat).unwrap(), vec!["Battery", "Signal"]);
    }

    #[test]
    fn test_classifiers_have_no_labels() {
        let cols = vec![json!("act"), json!("pow")];
        assert!(derive_labels("com", &cols).is_none());
        assert!(derive_labels("fac", &cols).is_none());
        assert_eq!(
            derive_labels("pow", &[json!("AF3/theta"), json!("AF3/alpha")]).unwrap(),
            vec!["AF3/theta", "AF3/alpha"]
        );
    }

    fn response(value: Value) -> SubscribeResponse {
        serde_json::from_value(value).unwrap()
    }

    fn engine(bus: EventBus) -> SubscriptionEngine {
        use crate::device::{AcquirePolicy, DeviceManager};
        use crate::session::Credentials;
        use crate::transport::TransportSettings;
        use std::time::Duration;

        let rpc = Arc::new(RpcCorrelator::new(
            TransportSettings {
                url: "ws://127.0.0.1:1".into(),
                accept_invalid_certs: false,
                connect_timeout: Duration::from_secs(1),
            },
            Duration::from_secs(1),
            bus.clone(),
        ));
        let devices = Arc::new(DeviceManager::new(Arc::clone(&rpc), AcquirePolicy::default()));
        let session = Arc::new(SessionController::new(
            Arc::clone(&rpc),
            devices,
            bus.clone(),
            Credentials::default(),
            RetryPolicy::none(),
        ));
        SubscriptionEngine::new(rpc, session, bus)
    }

    #[test]
    fn test_report_success_and_failure() {
        let bus = EventBus::new(16);
        let mut labels = bus.labels();
        let mut logs = bus.logs();
        let engine = engine(bus);

        let result = engine.report(
            Direction::Subscribe,
            response(json!({
                "success": [{"streamName": "pow", "cols": ["AF3/theta", "AF3/alpha"]}],
                "failure": [{"streamName": "eeg", "code": -32016, "message": "busy"}]
            })),
        );

        let label = labels.try_recv().unwrap();
        assert_eq!(label.stream_name, "pow");
        assert_eq!(label.labels, vec!["AF3/theta", "AF3/alpha"]);
        assert!(labels.try_recv().is_err());

        assert!(logs.try_recv().unwrap().message.contains("pow"));
        let failure_log = logs.try_recv().unwrap();
        assert_eq!(failure_log.level, LogLevel::Error);
        assert!(failure_log.message.contains("busy"));
        assert!(logs.try_recv().is_err());

        assert_eq!(result.succeeded().collect::<Vec<_>>(), vec!["pow"]);
        assert!(!result.all_succeeded());
        assert_eq!(
            result.get("eeg").unwrap().status,
            StreamStatus::Failure {
                code: -32016,
                message: "busy".into()
            }
        );
    }

    #[test]
    fn test_unsubscribe_publishes_no_labels() {
        let bus = EventBus::new(16);
        let mut labels = bus.labels();
        let mut logs = bus.logs();
        let engine = engine(bus);

        let result = engine.report(
            Direction::Unsubscribe,
            response(json!({"success": [{"streamName": "pow"}], "failure": []})),
        );

        assert!(result.all_succeeded());
        assert!(labels.try_recv().is_err());
        assert!(logs.try_recv().unwrap().message.starts_with("Unsubscribed"));
    }

    #[tokio::test]
    async fn test_subscribe_without_session_fails() {
        let engine = engine(EventBus::new(4));
        let err = engine.subscribe(&["pow"]).await.unwrap_err();
        assert!(matches!(err, CortexError::NoSession));
        let err = engine.unsubscribe(&["pow"]).await.unwrap_err();
        assert!(matches!(err, CortexError::NoSession));
    }
}

mod support;

use std::sync::Arc;
use std::time::Duration;

use cortex_bridge::protocol::constants::{ErrorCodes, Methods};
use cortex_bridge::{
    CortexClient, CortexConfig, CortexError, LogLevel, StreamHub, StreamKind, StreamStatus,
};
use serde_json::{Value, json};

use support::mock_cortex::{MockConnection, MockCortexServer, rpc_id};

const HEADSET: &str = "EPOCX-71D833AC";
const SESSION: &str = "f8cb7289-7ff6-4f15-a5b2-3e0a0f5a2e5b";

fn test_config(url: String) -> CortexConfig {
    let mut config = CortexConfig::new("test-client-id", "test-client-secret");
    config.cortex_url = url;
    config.timeouts.rpc_timeout_secs = 2;
    config.retry.session_delay_ms = 10;
    config.retry.subscribe_delay_ms = 10;
    config.device.poll_interval_ms = 20;
    config
}

async fn start_server_or_skip(test_name: &str) -> Option<MockCortexServer> {
    match MockCortexServer::start().await {
        Ok(server) => Some(server),
        Err(err) => {
            eprintln!("Skipping {test_name}: unable to start mock server: {err}");
            None
        }
    }
}

/// Answer everything `prepare(None, None)` sends.
async fn answer_prepare(connection: &mut MockConnection) {
    connection
        .answer(Methods::HAS_ACCESS_RIGHT, json!({"accessGranted": true}))
        .await;
    connection
        .answer(Methods::AUTHORIZE, json!({"cortexToken": "token-xyz"}))
        .await;
    connection.answer(Methods::CONTROL_DEVICE, json!({})).await;
    connection
        .answer(
            Methods::QUERY_HEADSETS,
            json!([{"id": HEADSET, "status": "connected"}]),
        )
        .await;
    connection
        .answer(
            Methods::CREATE_SESSION,
            json!({"id": SESSION, "status": "activated", "headset": {"id": HEADSET}}),
        )
        .await;
}

fn subscribed(stream: &str, cols: Value) -> Value {
    json!({
        "success": [{"streamName": stream, "cols": cols, "sid": SESSION}],
        "failure": []
    })
}

async fn prepared_client(server: &mut MockCortexServer) -> (Arc<CortexClient>, MockConnection) {
    let client = Arc::new(CortexClient::new(test_config(server.ws_url())));
    client.connect().await.unwrap();
    let mut connection = server.accept_connection().await;

    let responder = tokio::spawn(async move {
        answer_prepare(&mut connection).await;
        connection
    });
    client.prepare(None, None).await.unwrap();
    (client, responder.await.unwrap())
}

#[tokio::test]
async fn subscribe_reports_each_stream() {
    let Some(mut server) = start_server_or_skip("subscribe_reports_each_stream").await else {
        return;
    };
    let (client, mut connection) = prepared_client(&mut server).await;
    let mut labels = client.events().labels();
    let mut logs = client.events().logs();

    let responder = tokio::spawn(async move {
        connection
            .answer(
                Methods::SUBSCRIBE,
                json!({
                    "success": [{"streamName": "pow", "cols": ["AF3/theta", "AF3/alpha"], "sid": SESSION}],
                    "failure": [{"streamName": "eeg", "code": ErrorCodes::INVALID_STREAM, "message": "busy"}]
                }),
            )
            .await
    });

    let result = client.subscribe(&["pow", "eeg"]).await.unwrap();
    let request = responder.await.unwrap();

    assert_eq!(request["params"]["streams"], json!(["pow", "eeg"]));
    assert_eq!(request["params"]["session"], SESSION);
    assert_eq!(request["params"]["cortexToken"], "token-xyz");

    assert!(result.get("pow").unwrap().is_success());
    assert!(matches!(
        &result.get("eeg").unwrap().status,
        StreamStatus::Failure { message, .. } if message == "busy"
    ));

    let label = labels.recv().await.unwrap();
    assert_eq!(label.stream_name, "pow");
    assert_eq!(label.labels, vec!["AF3/theta", "AF3/alpha"]);
    assert!(labels.try_recv().is_err());

    let success_log = logs.recv().await.unwrap();
    assert_eq!(success_log.level, LogLevel::Info);
    assert!(success_log.message.contains("pow"));
    let failure_log = logs.recv().await.unwrap();
    assert!(failure_log.message.contains("busy"));
    assert!(logs.try_recv().is_err());
}

#[tokio::test]
async fn subscribe_retries_while_headset_is_busy() {
    let Some(mut server) = start_server_or_skip("subscribe_retries_while_headset_is_busy").await
    else {
        return;
    };
    let (client, mut connection) = prepared_client(&mut server).await;

    let responder = tokio::spawn(async move {
        connection
            .reject(Methods::SUBSCRIBE, ErrorCodes::HEADSET_NOT_READY, "not ready")
            .await;
        connection
            .answer(Methods::SUBSCRIBE, subscribed("met", json!(["eng", "str"])))
            .await;
    });

    let result = client.subscribe_with_retry(&["met"]).await.unwrap();
    responder.await.unwrap();
    assert!(result.all_succeeded());
}

#[tokio::test]
async fn stream_pushes_become_telemetry_events() {
    let Some(mut server) = start_server_or_skip("stream_pushes_become_telemetry_events").await
    else {
        return;
    };
    let (client, connection) = prepared_client(&mut server).await;
    let mut telemetry = client.events().telemetry();
    let mut raw = client.events().raw();

    connection
        .push_stream(SESSION, "eeg", 1_700_000_000.5, json!([4, 0, 4201.5, 4198.2, 0]))
        .await;
    connection
        .push_stream(SESSION, "com", 1_700_000_001.0, json!(["push", 0.62]))
        .await;
    connection
        .push_stream(
            SESSION,
            "dev",
            1_700_000_002.0,
            json!([3, 1.0, [4, 4, 2, 0], 87]),
        )
        .await;
    connection
        .send_json(json!({"sid": SESSION, "time": 1.0, "unknown": [1]}))
        .await;
    connection
        .push_stream(SESSION, "pow", 1_700_000_003.0, json!([1.5, 0.5, 0.2, 0.1, 0.05]))
        .await;

    let wait = Duration::from_secs(3);
    let eeg = tokio::time::timeout(wait, telemetry.recv()).await.unwrap().unwrap();
    assert_eq!(eeg.kind, StreamKind::Eeg);
    assert_eq!(eeg.session_id, SESSION);
    assert_eq!(eeg.event_name(), "new_eeg_data");
    assert_eq!(eeg.to_payload()["time"], 1_700_000_000.5);

    let com = tokio::time::timeout(wait, telemetry.recv()).await.unwrap().unwrap();
    let command = com.mental_command().unwrap();
    assert_eq!(command.action, "push");

    let dev = tokio::time::timeout(wait, telemetry.recv()).await.unwrap().unwrap();
    let status = dev.device_status().unwrap();
    assert_eq!(status.contact_quality.len(), 4);
    assert_eq!(status.battery_percent, Some(87));

    let pow = tokio::time::timeout(wait, telemetry.recv()).await.unwrap().unwrap();
    assert_eq!(pow.kind, StreamKind::Pow);
    assert_eq!(pow.band_power().unwrap().channel_powers.len(), 1);

    let raw_eeg = raw.recv().await.unwrap();
    assert_eq!(raw_eeg.stream, "eeg");
    assert_eq!(raw_eeg.message["eeg"][2], 4201.5);
    assert_eq!(raw.recv().await.unwrap().stream, "pow");
    assert!(raw.try_recv().is_err());
}

#[tokio::test]
async fn hub_subscribes_on_first_holder_and_unsubscribes_on_last() {
    let Some(mut server) =
        start_server_or_skip("hub_subscribes_on_first_holder_and_unsubscribes_on_last").await
    else {
        return;
    };
    let client = Arc::new(CortexClient::new(test_config(server.ws_url())));
    let hub = StreamHub::new(Arc::clone(&client));
    client.connect().await.unwrap();
    let mut connection = server.accept_connection().await;

    let responder = tokio::spawn(async move {
        answer_prepare(&mut connection).await;
        connection
            .answer(Methods::SUBSCRIBE, subscribed("pow", json!(["AF3/theta"])))
            .await;
        connection
    });
    let first = hub.start("pow", "dashboard", None).await.unwrap();
    let mut connection = responder.await.unwrap();
    assert!(first.first);
    assert_eq!(first.count, 1);

    // Second holder: no traffic at all.
    let second = hub.start("pow", "recorder", None).await.unwrap();
    assert!(!second.first);
    assert_eq!(second.count, 2);
    assert_eq!(hub.renew("pow", "recorder", None), Some(2));

    let stop = hub.stop("pow", "dashboard").await.unwrap();
    assert!(!stop.empty);
    let quiet = tokio::time::timeout(Duration::from_millis(100), connection.recv_request()).await;
    assert!(quiet.is_err());

    let responder = tokio::spawn(async move {
        connection
            .answer(Methods::UNSUBSCRIBE, json!({"success": [{"streamName": "pow"}], "failure": []}))
            .await
    });
    let stop = hub.stop("pow", "recorder").await.unwrap();
    let request = responder.await.unwrap();
    assert!(stop.empty);
    assert_eq!(request["params"]["streams"], json!(["pow"]));
    assert!(hub.status().is_empty());
}

#[tokio::test]
async fn hub_releases_lease_when_stream_is_rejected() {
    let Some(mut server) = start_server_or_skip("hub_releases_lease_when_stream_is_rejected").await
    else {
        return;
    };
    let (client, mut connection) = prepared_client(&mut server).await;
    let hub = StreamHub::new(Arc::clone(&client));

    let responder = tokio::spawn(async move {
        connection
            .answer(
                Methods::SUBSCRIBE,
                json!({
                    "success": [],
                    "failure": [{"streamName": "fac", "code": ErrorCodes::INVALID_STREAM, "message": "no license"}]
                }),
            )
            .await;
    });

    let err = hub.start("fac", "ui", None).await.unwrap_err();
    responder.await.unwrap();

    assert!(matches!(err, CortexError::Rpc { code, .. } if code == ErrorCodes::INVALID_STREAM));
    assert_eq!(hub.count("fac"), 0);
}

#[tokio::test]
async fn expired_leases_unsubscribe() {
    let Some(mut server) = start_server_or_skip("expired_leases_unsubscribe").await else {
        return;
    };
    let (client, mut connection) = prepared_client(&mut server).await;
    let hub = StreamHub::new(Arc::clone(&client));

    let responder = tokio::spawn(async move {
        connection
            .answer(Methods::SUBSCRIBE, subscribed("mot", json!(["Q0", "Q1"])))
            .await;
        connection
    });
    hub.start("mot", "short-lived", Some(Duration::ZERO))
        .await
        .unwrap();
    let mut connection = responder.await.unwrap();

    assert!(hub.prune_expired().await.is_empty());
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let responder = tokio::spawn(async move {
        connection
            .answer(Methods::UNSUBSCRIBE, json!({"success": [{"streamName": "mot"}]}))
            .await
    });
    assert_eq!(hub.prune_expired().await, vec!["mot".to_string()]);
    let request = responder.await.unwrap();
    assert_eq!(request["params"]["streams"], json!(["mot"]));
    assert!(hub.prune_expired().await.is_empty());
}

#[tokio::test]
async fn stop_during_first_subscribe_waits_then_unsubscribes() {
    let Some(mut server) =
        start_server_or_skip("stop_during_first_subscribe_waits_then_unsubscribes").await
    else {
        return;
    };
    let (client, mut connection) = prepared_client(&mut server).await;
    let hub = Arc::new(StreamHub::new(Arc::clone(&client)));

    let starter = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.start("pow", "dashboard", None).await })
    };
    let subscribe = connection.recv_request_method(Methods::SUBSCRIBE).await;

    let stopper = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.stop("pow", "dashboard").await })
    };
    let early = tokio::time::timeout(Duration::from_millis(200), connection.recv_request()).await;
    assert!(early.is_err(), "unsubscribe sent while subscribe was pending");

    connection
        .send_result(rpc_id(&subscribe), subscribed("pow", json!(["AF3/theta"])))
        .await;
    let started = starter.await.unwrap().unwrap();
    assert!(started.first);

    let unsubscribe = connection
        .answer(Methods::UNSUBSCRIBE, json!({"success": [{"streamName": "pow"}], "failure": []}))
        .await;
    let stopped = stopper.await.unwrap().unwrap();

    assert!(stopped.empty);
    assert!(stopped.removed);
    assert_eq!(unsubscribe["params"]["streams"], json!(["pow"]));
    assert_eq!(hub.count("pow"), 0);
    assert!(hub.status().is_empty());
}

#[tokio::test]
async fn holder_waiting_on_rejected_subscribe_subscribes_itself() {
    let Some(mut server) =
        start_server_or_skip("holder_waiting_on_rejected_subscribe_subscribes_itself").await
    else {
        return;
    };
    let (client, mut connection) = prepared_client(&mut server).await;
    let hub = Arc::new(StreamHub::new(Arc::clone(&client)));

    let first = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.start("met", "dashboard", None).await })
    };
    let subscribe = connection.recv_request_method(Methods::SUBSCRIBE).await;

    let second = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.start("met", "recorder", None).await })
    };
    let early = tokio::time::timeout(Duration::from_millis(200), connection.recv_request()).await;
    assert!(early.is_err(), "second holder did not wait for the pending subscribe");

    connection
        .send_result(
            rpc_id(&subscribe),
            json!({
                "success": [],
                "failure": [{"streamName": "met", "code": ErrorCodes::HEADSET_NOT_READY, "message": "busy"}]
            }),
        )
        .await;
    assert!(first.await.unwrap().is_err());

    let retried = connection
        .answer(Methods::SUBSCRIBE, subscribed("met", json!(["eng.isActive", "eng"])))
        .await;
    let second = second.await.unwrap().unwrap();

    assert_eq!(retried["params"]["streams"], json!(["met"]));
    assert!(second.first);
    assert_eq!(second.count, 1);
    assert_eq!(hub.status()[0].holders, vec!["recorder"]);
}

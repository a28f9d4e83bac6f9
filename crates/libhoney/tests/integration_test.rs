// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{TimeZone, Utc};
use libhoney::{
    client::{Client, ClientConfig},
    config::TransmissionConfig,
    engine::TransmissionEngine,
    errors::OutcomeError,
    event::{Event, ValidatedEvent},
    response::{Outcome, ResponseSink},
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::{
    net::TcpListener,
    time::{timeout, Duration},
};

type Collected = Arc<Mutex<Vec<Outcome>>>;

fn collecting_sink() -> (Arc<dyn ResponseSink>, Collected) {
    let collected: Collected = Arc::default();
    let sink_outcomes = collected.clone();
    let sink: Arc<dyn ResponseSink> = Arc::new(move |outcomes: Vec<Outcome>| {
        sink_outcomes.lock().unwrap().extend(outcomes);
    });
    (sink, collected)
}

fn event(host: &str, dataset: &str, n: u64) -> ValidatedEvent {
    let mut event = Event::new(host, "mock-write-key", dataset)
        .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap())
        .with_metadata(json!({ "n": n }));
    event.add_field("n", n);
    event.validate().expect("valid event")
}

async fn flush(engine: &TransmissionEngine) {
    timeout(Duration::from_secs(5), engine.flush())
        .await
        .expect("timed out waiting for flush")
        .expect("flush failed");
}

#[tokio::test]
async fn engine_ships_batch_to_dataset_endpoint() {
    let mut mock_server = Server::new_async().await;

    let mock = mock_server
        .mock("POST", "/1/batch/my-dataset")
        .match_header("X-Honeycomb-Team", "mock-write-key")
        .match_header("Content-Type", "application/json")
        .match_header(
            "User-Agent",
            Matcher::Regex(r"^libhoney-rust/\S+ my-app/1\.0$".to_string()),
        )
        .match_body(Matcher::Json(json!([
            {"time": "2024-05-06T07:08:09Z", "samplerate": 1, "data": {"n": 0}},
            {"time": "2024-05-06T07:08:09Z", "samplerate": 1, "data": {"n": 1}},
        ])))
        .with_status(200)
        .with_body(r#"[{"status": 202}, {"status": 202}]"#)
        .expect(1)
        .create_async()
        .await;

    let (sink, outcomes) = collecting_sink();
    let engine = TransmissionEngine::new(
        TransmissionConfig {
            user_agent_addition: " my-app/1.0 ".to_string(),
            ..Default::default()
        },
        sink,
    )
    .expect("failed to create engine");

    engine.send_event(event(&mock_server.url(), "my-dataset", 0));
    engine.send_event(event(&mock_server.url(), "my-dataset", 1));
    flush(&engine).await;

    mock.assert_async().await;
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 2);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.status_code, Some(202));
        assert!(outcome.error.is_none(), "{outcome:?}");
        assert!(outcome.duration.is_some());
        assert_eq!(outcome.metadata, Some(json!({ "n": i })));
    }
}

#[tokio::test]
async fn per_event_rejections_are_reported_individually() {
    let mut mock_server = Server::new_async().await;

    let _mock = mock_server
        .mock("POST", "/1/batch/ds")
        .with_status(200)
        .with_body(r#"[{"status": 202}, {"status": 400, "error": "unknown field type"}]"#)
        .create_async()
        .await;

    let (sink, outcomes) = collecting_sink();
    let engine = TransmissionEngine::new(TransmissionConfig::default(), sink).unwrap();

    engine.send_event(event(&mock_server.url(), "ds", 0));
    engine.send_event(event(&mock_server.url(), "ds", 1));
    flush(&engine).await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].status_code, Some(400));
    assert_eq!(
        outcomes[1].error,
        Some(OutcomeError::Rejected("unknown field type".to_string()))
    );
    assert_eq!(outcomes[1].metadata, Some(json!({ "n": 1 })));
}

#[tokio::test]
async fn error_status_applies_to_every_event() {
    let mut mock_server = Server::new_async().await;

    let _mock = mock_server
        .mock("POST", "/1/batch/ds")
        .with_status(401)
        .with_body("unknown API key")
        .create_async()
        .await;

    let (sink, outcomes) = collecting_sink();
    let engine = TransmissionEngine::new(TransmissionConfig::default(), sink).unwrap();

    for n in 0..3 {
        engine.send_event(event(&mock_server.url(), "ds", n));
    }
    flush(&engine).await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 3);
    for (n, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.metadata, Some(json!({ "n": n })));
        assert_eq!(outcome.status_code, Some(401));
        assert_eq!(
            outcome.error,
            Some(OutcomeError::Status {
                status: 401,
                body: "unknown API key".to_string(),
            })
        );
    }
}

#[tokio::test]
async fn unparseable_response_body_is_reported() {
    let mut mock_server = Server::new_async().await;

    let _mock = mock_server
        .mock("POST", "/1/batch/ds")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let (sink, outcomes) = collecting_sink();
    let engine = TransmissionEngine::new(TransmissionConfig::default(), sink).unwrap();

    engine.send_event(event(&mock_server.url(), "ds", 0));
    flush(&engine).await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0].error,
        Some(OutcomeError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn request_times_out_when_server_never_answers() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("unable to bind TCP listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let (sink, outcomes) = collecting_sink();
    let engine = TransmissionEngine::new(
        TransmissionConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        },
        sink,
    )
    .unwrap();

    engine.send_event(event(&format!("http://{addr}"), "ds", 0));
    engine.send_event(event(&format!("http://{addr}"), "ds", 1));
    flush(&engine).await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 2);
    for (n, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.metadata, Some(json!({ "n": n })));
        assert_eq!(outcome.error, Some(OutcomeError::Timeout));
    }
}

#[tokio::test]
async fn events_for_different_datasets_go_to_separate_requests() {
    let mut mock_server = Server::new_async().await;

    let first = mock_server
        .mock("POST", "/1/batch/first")
        .with_status(200)
        .with_body(r#"[{"status": 202}, {"status": 202}]"#)
        .expect(1)
        .create_async()
        .await;
    let second = mock_server
        .mock("POST", "/1/batch/second")
        .with_status(200)
        .with_body(r#"[{"status": 202}]"#)
        .expect(1)
        .create_async()
        .await;

    let (sink, outcomes) = collecting_sink();
    let engine = TransmissionEngine::new(TransmissionConfig::default(), sink).unwrap();

    engine.send_event(event(&mock_server.url(), "first", 0));
    engine.send_event(event(&mock_server.url(), "second", 1));
    engine.send_event(event(&mock_server.url(), "first", 2));
    flush(&engine).await;

    first.assert_async().await;
    second.assert_async().await;
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(Outcome::is_success));
}

#[tokio::test]
async fn client_delivers_outcomes_to_response_queue() {
    let mut mock_server = Server::new_async().await;

    let mock = mock_server
        .mock("POST", "/1/batch/svc")
        .match_header("X-Honeycomb-Team", "client-key")
        .with_status(200)
        .with_body(r#"[{"status": 202}, {"status": 202}]"#)
        .create_async()
        .await;

    let (client, mut responses) = Client::with_responses(ClientConfig {
        api_host: mock_server.url(),
        write_key: Some("client-key".to_string()),
        dataset: Some("svc".to_string()),
        ..Default::default()
    })
    .expect("failed to create client");

    for n in 0..2 {
        let mut event = client.new_event().with_metadata(json!(n));
        event.add_field("n", n);
        client.send_event(event);
    }
    // Dropped at validation; produces no outcome.
    let mut invalid = client.new_event();
    invalid.dataset = String::new();
    client.send_event(invalid);

    timeout(Duration::from_secs(5), client.flush())
        .await
        .expect("timed out waiting for flush")
        .expect("flush failed");

    mock.assert_async().await;
    for n in 0..2 {
        let outcome = responses.try_recv().expect("missing outcome");
        assert_eq!(outcome.metadata, Some(json!(n)));
        assert_eq!(outcome.status_code, Some(202));
    }
    assert!(responses.try_recv().is_err());
}

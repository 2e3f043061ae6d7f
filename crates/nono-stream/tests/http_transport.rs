//! End-to-end tests for the HTTP transport against a local mock service.
//!
//! Uses wiremock as the completions endpoint; every test drives a real
//! `CompletionClient` through `HttpTransport`.

use std::sync::Arc;

use nono_stream::prelude::*;
use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETIONS: &str = "/v1/chat/completions";

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Message(String, bool),
    Finish(String),
    Error(String),
}

fn recorder() -> (impl CompletionCallbacks, Arc<Mutex<Vec<Event>>>) {
    let events: Arc<Mutex<Vec<Event>>> = Arc::default();
    let (m, f, e) = (events.clone(), events.clone(), events.clone());
    let callbacks = Callbacks::new(
        move |text: &str, is_first: bool| m.lock().push(Event::Message(text.into(), is_first)),
        move |full: &str| f.lock().push(Event::Finish(full.into())),
        move |message: &str| e.lock().push(Event::Error(message.into())),
    );
    (callbacks, events)
}

fn sse_body(deltas: &[&str], done: bool) -> String {
    let mut body = String::new();
    for delta in deltas {
        let chunk = json!({"choices":[{"delta":{"content":delta},"finish_reason":null}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn client(server: &MockServer, retry: RetryPolicy) -> CompletionClient {
    let config = ClientConfig::new("sk-test")
        .base_url(server.uri())
        .model("gpt-test")
        .retry(retry);
    CompletionClient::new(config).expect("client")
}

fn query(text: &str) -> Query {
    Query::new(TaskKind::Translate, "You translate.", text).expect("query")
}

#[tokio::test]
async fn streams_deltas_and_sends_expected_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-test",
            "stream": true,
            "temperature": 0.0,
            "max_tokens": 1000,
            "messages": [
                {"role": "system", "content": "You translate."},
                {"role": "user", "content": "Hello world"}
            ]
        })))
        .respond_with(event_stream(sse_body(&["Hel", "lo"], true)))
        .expect(1)
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(0)).open(&query("Hello world"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Finished);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Message("Hel".into(), true),
            Event::Message("lo".into(), false),
            Event::Finish("Hello".into()),
        ]
    );
}

#[tokio::test]
async fn rate_limited_open_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(event_stream(sse_body(&["ok"], true)))
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(3)).open(&query("hi"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Finished);
    assert_eq!(
        *events.lock(),
        vec![Event::Message("ok".into(), true), Event::Finish("ok".into())]
    );
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
}

#[tokio::test]
async fn client_error_status_fails_with_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": {"message": "model not found"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(3)).open(&query("hi"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Failed);
    assert_eq!(*events.lock(), vec![Event::Error("model not found".into())]);
}

#[tokio::test]
async fn stream_closed_early_reconnects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(event_stream(sse_body(&["Bon"], false)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(event_stream(sse_body(&["jour"], true)))
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(2)).open(&query("hi"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Finished);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Message("Bon".into(), true),
            Event::Message("jour".into(), false),
            Event::Finish("Bonjour".into()),
        ]
    );
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(2)).open(&query("hi"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Failed);
    let events = events.lock().clone();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Error(msg) if msg.contains("after 2 retries") && msg.contains("503")));
}

#[tokio::test]
async fn json_response_to_a_streaming_request_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(3)).open(&query("hi"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Failed);
    let events = events.lock().clone();
    assert!(matches!(&events[..], [Event::Error(msg)] if msg.contains("application/json")));
}

#[tokio::test]
async fn fatal_error_event_is_surfaced_once() {
    let server = MockServer::start().await;
    let body = format!(
        "{}event: FatalError\ndata: quota exceeded\n\n",
        sse_body(&["partial"], false)
    );
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(event_stream(body))
        .expect(1)
        .mount(&server)
        .await;

    let (callbacks, events) = recorder();
    let handle = client(&server, RetryPolicy::immediate(3)).open(&query("hi"), callbacks);

    assert_eq!(handle.wait().await, SessionState::Failed);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Message("partial".into(), true),
            Event::Error("quota exceeded".into()),
        ]
    );
}

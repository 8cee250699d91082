//! End-to-end delivery through the real `ureq` transport against a mock hub.

use std::time::Duration;

use serde_json::{json, Value};
use vemetric::{
    properties, Client, Context, DispatchMode, Error, Options, QueueFullPolicy, TrackEvent,
    UpdateUser, UserData,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(server: &MockServer) -> Options {
    Options {
        token: "test-token".into(),
        host: Some(server.uri()),
        ..Default::default()
    }
}

fn async_options(server: &MockServer) -> Options {
    Options {
        mode: DispatchMode::Async,
        queue_capacity: 4,
        queue_full: QueueFullPolicy::Block,
        ..options(server)
    }
}

/// Runs blocking client code off the async test runtime.
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn track_event_sends_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/e"))
        .and(header("Content-Type", "application/json"))
        .and(header("Token", "test-token"))
        .and(header("User-Agent", vemetric::USER_AGENT))
        .and(header("V-SDK", "rust"))
        .and(header("V-SDK-Version", vemetric::SDK_VERSION))
        .and(body_partial_json(json!({ "name": "Signup", "userIdentifier": "u1" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let opts = options(&server);
    let result = blocking(move || {
        let client = Client::new(opts)?;
        let mut event = TrackEvent::new("Signup");
        event.user_identifier = Some("u1".into());
        client.track_event(&Context::background(), &event)
    })
    .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn update_user_sends_data_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/u"))
        .and(body_json(json!({
            "userIdentifier": "u1",
            "data": { "set": { "plan": "Business" } }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let opts = options(&server);
    let result = blocking(move || {
        let client = Client::new(opts)?;
        let mut update = UpdateUser::new("u1");
        update.user_data = Some(UserData {
            set: Some(properties([("plan", "Business")])),
            ..Default::default()
        });
        client.update_user(&Context::background(), &update)
    })
    .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn non_2xx_is_bad_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let opts = options(&server);
    let result = blocking(move || {
        let client = Client::new(opts)?;
        client.track_event(&Context::background(), &TrackEvent::new("Signup"))
    })
    .await;

    assert!(matches!(result, Err(Error::BadStatus(500))));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_hub_hits_caller_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let opts = options(&server);
    let result = blocking(move || {
        let client = Client::new(opts)?;
        let ctx = Context::background().with_timeout(Duration::from_millis(100));
        client.track_event(&ctx, &TrackEvent::new("Slow"))
    })
    .await;

    assert!(matches!(result, Err(Error::DeadlineExceeded)));
}

/**
 * Without a caller deadline the client-wide request timeout applies.
 */
#[tokio::test(flavor = "multi_thread")]
async fn slow_hub_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let opts = Options {
        timeout: Duration::from_millis(100),
        ..options(&server)
    };
    let result = blocking(move || {
        let client = Client::new(opts)?;
        client.track_event(&Context::background(), &TrackEvent::new("Slow"))
    })
    .await;

    assert!(matches!(result, Err(Error::Network(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn async_client_drains_in_order_on_close() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/e"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let opts = async_options(&server);
    blocking(move || {
        let client = Client::new(opts).unwrap();
        let ctx = Context::background();
        for name in ["A", "B", "C"] {
            client.track_event(&ctx, &TrackEvent::new(name)).unwrap();
        }
        client.close();
    })
    .await;

    let names: Vec<Value> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap()["name"].clone())
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

/**
 * Failed async deliveries are swallowed and do not stall shutdown.
 */
#[tokio::test(flavor = "multi_thread")]
async fn async_failures_do_not_block_close() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let opts = Options {
        queue_capacity: 1,
        ..async_options(&server)
    };
    let state = blocking(move || {
        let client = Client::new(opts).unwrap();
        client
            .track_event(&Context::background(), &TrackEvent::new("Doomed"))
            .unwrap();
        client.close();
        client.state()
    })
    .await;

    assert_eq!(state, vemetric::ClientState::Closed);
}

#[test]
fn unreachable_hub_is_network_error() {
    let client = Client::new(Options {
        token: "test-token".into(),
        host: Some("http://127.0.0.1:1".into()),
        ..Default::default()
    })
    .unwrap();

    let result = client.track_event(&Context::background(), &TrackEvent::new("Lost"));
    assert!(matches!(result, Err(Error::Network(_))));
}

//! End-to-end exercises of `SourceClient` against a real HTTP server, the
//! way the donor's SDK tests stand up a small `axum` fixture rather than
//! mocking at the `reqwest` layer (see `tests/mock_server.rs` in the
//! donor). Covers retry-on-429, the double-URL-encoding rule for uuids
//! containing `/` or `//`, and the zero-width-space stripping invariant.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;

use zoom_ingest::config::ZoomConfig;
use zoom_ingest::source::SourceClient;

#[derive(Clone)]
struct FixtureState {
    request_count: Arc<AtomicUsize>,
    fail_first_n: usize,
    last_path: Arc<std::sync::Mutex<Option<String>>>,
}

async fn recordings_handler(
    State(state): State<FixtureState>,
    AxumPath(uuid): AxumPath<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    *state.last_path.lock().unwrap() = Some(uuid.clone());
    assert!(headers.get("authorization").is_some(), "every call must carry a bearer credential");

    let attempt = state.request_count.fetch_add(1, Ordering::SeqCst);
    if attempt < state.fail_first_n {
        return (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "0")]).into_response();
    }

    Json(json!({
        "id": 123,
        "uuid": uuid,
        "host_id": "host-1",
        "topic": "Lecture\u{200b} 1",
        "start_time": "2024-01-02T10:00:00Z",
        "duration": 45,
        "recording_files": []
    }))
    .into_response()
}

async fn start_fixture(fail_first_n: usize) -> (FixtureState, SocketAddr) {
    let state = FixtureState {
        request_count: Arc::new(AtomicUsize::new(0)),
        fail_first_n,
        last_path: Arc::new(std::sync::Mutex::new(None)),
    };

    let app = Router::new().route("/meetings/:uuid/recordings", get(recordings_handler)).with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, addr)
}

fn test_zoom_config() -> ZoomConfig {
    ZoomConfig { jwt_key: "key-1".into(), jwt_secret: "secret-1".into(), gdpr: false }
}

#[tokio::test]
async fn get_recording_succeeds_and_strips_zero_width_space() {
    let (_state, addr) = start_fixture(0).await;
    let client = SourceClient::with_base_url_for_testing(&test_zoom_config(), format!("http://{addr}")).unwrap();

    let recording = client.get_recording("abc==").await.unwrap();
    assert_eq!(recording.uuid, "abc==");
    assert_eq!(recording.topic, "Lecture 1");
}

#[tokio::test(start_paused = true)]
async fn get_recording_retries_past_rate_limiting() {
    let (state, addr) = start_fixture(2).await;
    let client = SourceClient::with_base_url_for_testing(&test_zoom_config(), format!("http://{addr}")).unwrap();

    let recording = client.get_recording("abc==").await.unwrap();
    assert_eq!(recording.uuid, "abc==");
    assert_eq!(state.request_count.load(Ordering::SeqCst), 3, "two 429s then a success");
}

#[tokio::test]
async fn uuid_with_double_slash_reaches_the_server_double_encoded() {
    let (state, addr) = start_fixture(0).await;
    let client = SourceClient::with_base_url_for_testing(&test_zoom_config(), format!("http://{addr}")).unwrap();

    client.get_recording("AB//CD==").await.unwrap();

    let observed = state.last_path.lock().unwrap().clone().unwrap();
    assert!(!observed.contains('/'), "a double-slash uuid must not reach the server with a literal slash: {observed}");
}

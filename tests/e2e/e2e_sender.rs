use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use traktor_api::{ApiConfig, FxEvent, ReqwestTransport, RestErrorKind, Sender};

#[derive(Debug)]
struct Captured {
    method: Method,
    path: String,
    content_type: Option<String>,
    content_length: Option<String>,
    body: Bytes,
}

#[derive(Clone)]
struct AppState {
    captured: mpsc::UnboundedSender<Captured>,
}

#[tokio::test]
async fn e2e_send_reaches_receiver_with_json_headers() {
    let mut server = TestServer::start().await;
    let sender = Sender::new(ApiConfig::new(server.base_url.clone()));

    sender
        .send("login", &sonic_rs::json!({"user": "a", "pass": "b"}))
        .expect("payload serializes");

    let captured = server.next().await;
    assert_eq!(captured.method, Method::POST);
    assert_eq!(captured.path, "/login");
    assert_eq!(captured.content_type.as_deref(), Some("application/json"));
    assert_eq!(
        captured.content_length,
        Some(captured.body.len().to_string())
    );

    let parsed: sonic_rs::Value = sonic_rs::from_slice(&captured.body).expect("json body");
    assert_eq!(parsed, sonic_rs::json!({"user": "a", "pass": "b"}));
}

#[tokio::test]
async fn e2e_dispatch_observes_status() {
    let mut server = TestServer::start().await;
    let sender = Sender::new(ApiConfig::new(server.base_url.clone()));

    let response = sender
        .dispatch("fx/1", &FxEvent::knob(1, 2, 0.5))
        .expect("fx event serializes")
        .await
        .expect("receiver answers");
    assert_eq!(response.status(), 200);

    let captured = server.next().await;
    assert_eq!(captured.path, "/fx/1");
    let event: FxEvent = sonic_rs::from_slice(&captured.body).expect("fx body");
    assert_eq!(event, FxEvent::knob(1, 2, 0.5));
}

#[tokio::test]
async fn e2e_configured_timeout_is_applied() {
    let server = TestServer::start().await;
    let config =
        ApiConfig::new(server.base_url.clone()).with_timeout(Duration::from_millis(200));
    let sender = Sender::new(config);

    let err = sender
        .dispatch("slow", &1)
        .expect("serializes")
        .await
        .expect_err("slow endpoint exceeds the configured timeout");
    assert_eq!(err.kind(), RestErrorKind::Timeout);
}

#[tokio::test]
async fn e2e_custom_client_timeout_is_applied() {
    let server = TestServer::start().await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("client builds");
    let sender = Sender::with_transport(
        ApiConfig::new(server.base_url.clone()),
        ReqwestTransport::with_client(client),
    );

    let err = sender
        .dispatch("slow", &1)
        .expect("serializes")
        .await
        .expect_err("client-level timeout fires on the slow endpoint");
    assert_eq!(err.kind(), RestErrorKind::Timeout);
}

#[tokio::test]
async fn e2e_connection_refused_is_invisible_to_send() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let sender = Sender::new(ApiConfig::new(format!("http://{addr}")));
    sender.send("state", &sonic_rs::json!({})).expect("send never reports network errors");

    let err = sender
        .dispatch("state", &sonic_rs::json!({}))
        .expect("serializes")
        .await
        .expect_err("nothing listens on the port");
    assert_eq!(err.kind(), RestErrorKind::Connect);
}

struct TestServer {
    base_url: String,
    captured: mpsc::UnboundedReceiver<Captured>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .fallback(capture_handler)
            .with_state(AppState { captured: tx });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url,
            captured: rx,
            task,
        }
    }

    async fn next(&mut self) -> Captured {
        timeout(Duration::from_secs(5), self.captured.recv())
            .await
            .expect("receiver saw no request in time")
            .expect("capture channel closed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn capture_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let path = uri.path().to_string();
    let slow = path == "/slow";

    let _ = state.captured.send(Captured {
        method,
        path,
        content_type: header("content-type"),
        content_length: header("content-length"),
        body,
    });

    if slow {
        sleep(Duration::from_millis(1500)).await;
    }
    StatusCode::OK
}

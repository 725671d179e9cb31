#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tmf720_api::config::ServerConfig;
use tmf720_api::router::build_app_router;
use tmf720_api::state::AppState;
use tmf720_events::{HubConfig, NotificationHub, RetryPolicy, WebhookDelivery};

pub const COLLECTION: &str = "/tmf-api/digitalIdentityManagement/v4/digitalIdentity";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        public_base_url: "http://test.local".to_string(),
    }
}

/// Hub settings with short backoffs so retry tests finish quickly.
pub fn test_hub_config() -> HubConfig {
    HubConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            multiplier: 2,
        },
        delivery_timeout: Duration::from_secs(2),
        shutdown_grace: Duration::from_secs(1),
        ..HubConfig::default()
    }
}

/// The router plus the state behind it, for assertions that bypass HTTP.
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Build the full application with the production middleware stack and a
/// real webhook delivery channel.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_hub_config())
}

pub fn build_test_app_with(hub_config: HubConfig) -> TestApp {
    let config = test_config();
    let delivery = WebhookDelivery::new(hub_config.delivery_timeout).unwrap();
    let hub = NotificationHub::start(hub_config, Arc::new(delivery));
    let state = AppState::new(config.clone(), hub);
    let router = build_app_router(state.clone(), &config);
    TestApp { router, state }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn patch_json(app: &TestApp, uri: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A minimal valid digital identity body.
pub fn identity_body(nickname: &str) -> Value {
    serde_json::json!({
        "nickname": nickname,
        "credential": [
            { "id": "cred-1", "@type": "LoginPasswordCredential", "trustLevel": "high" }
        ],
        "individualIdentified": { "id": "ind-1", "@referredType": "Individual" }
    })
}

// ---------------------------------------------------------------------------
// Listener endpoint
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ReceiverState {
    received: Arc<Mutex<Vec<Value>>>,
    status: StatusCode,
}

/// A real HTTP listener endpoint that records every event posted to it.
pub struct Receiver {
    pub url: String,
    state: ReceiverState,
}

impl Receiver {
    /// Accept everything with `204 No Content`.
    pub async fn start() -> Self {
        Self::responding(StatusCode::NO_CONTENT).await
    }

    /// Answer every delivery with `status`.
    pub async fn responding(status: StatusCode) -> Self {
        let state = ReceiverState {
            received: Arc::new(Mutex::new(Vec::new())),
            status,
        };

        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/hook"),
            state,
        }
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap().clone()
    }

    /// Wait until at least `count` events arrived, or panic after 5s.
    pub async fn wait_for(&self, count: usize) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let received = self.received();
                if received.len() >= count {
                    return received;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} deliveries to {}", self.url))
    }
}

async fn receive(State(state): State<ReceiverState>, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().unwrap().push(body);
    state.status
}

/// Give in-flight deliveries a moment to (not) happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

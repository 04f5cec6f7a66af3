//! Integration tests for the HTTP backend.
//!
//! Each test spins up an Axum server on a random port that plays the
//! integrations API, then drives the real reqwest client (and, for the
//! end-to-end cases, the orchestrator) against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use integration_flows::backend::{DesignPreview, HttpBackend, IntegrationBackend, Listing};
use integration_flows::conversation::ConversationSink;
use integration_flows::design_url::{DesignKind, DesignUrlParser};
use integration_flows::error::BackendError;
use integration_flows::flow::{FailureKind, FlowStep, classify_error};
use integration_flows::redirect::{MemoryKeyValueStore, PageUrl, RedirectMarkerStore};
use integration_flows::{IntegrationOrchestrator, OrchestratorDeps, ProviderId};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const TOKEN: &str = "test-token";

fn json_error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {TOKEN}");
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

async fn status(Path(provider): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return json_error(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "missing credentials" }),
        );
    }
    match provider.as_str() {
        "source_host_a" | "design_host" => Json(json!({ "connected": true })).into_response(),
        "source_host_b" => json_error(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "Source Host B token expired" }),
        ),
        _ => Json(json!({ "connected": false })).into_response(),
    }
}

async fn resources(Path(provider): Path<String>) -> Response {
    match provider.as_str() {
        "source_host_a" => Json(json!({
            "needs_installation": true,
            "install_url": "https://source-a.example/apps/install"
        }))
        .into_response(),
        "source_host_b" => json_error(
            StatusCode::FORBIDDEN,
            json!({
                "error": "App not installed",
                "code": "installation_required",
                "install_url": "https://source-b.example/install"
            }),
        ),
        "video_host" => Json(json!({
            "items": [{
                "id": "v1",
                "title": "Sprint demo",
                "url": "https://video.example/v1",
                "duration_seconds": 95
            }]
        }))
        .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "").into_response(),
    }
}

async fn preview(
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if key == "Missing" {
        return json_error(StatusCode::NOT_FOUND, json!({ "error": "File not found" }));
    }
    let kind = params.get("kind").cloned().unwrap_or_default();
    Json(json!({ "name": format!("{key} ({kind})"), "page_count": 4 })).into_response()
}

async fn authorize(Path(provider): Path<String>) -> Json<Value> {
    Json(json!({ "url": format!("https://auth.example/{provider}?state=abc") }))
}

/// Start an Axum server on a random port, return its base URL.
async fn start_server() -> String {
    let app = Router::new()
        .route("/api/integrations/{provider}/status", get(status))
        .route("/api/integrations/{provider}/resources", get(resources))
        .route("/api/integrations/{provider}/authorize", get(authorize))
        .route(
            "/api/integrations/design_host/files/{key}/preview",
            get(preview),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

fn backend(base_url: &str) -> HttpBackend {
    HttpBackend::new(base_url, Some(SecretString::from(TOKEN)))
}

// ── Backend contract ─────────────────────────────────────────────────

#[tokio::test]
async fn connection_status_reads_connected_flag() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        assert!(backend.connection_status(ProviderId::SourceHostA).await.unwrap());
        assert!(!backend.connection_status(ProviderId::VideoHost).await.unwrap());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn error_status_carries_backend_message() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        let err = backend
            .connection_status(ProviderId::SourceHostB)
            .await
            .unwrap_err();
        match &err {
            BackendError::Status { status, message } => {
                assert_eq!(*status, 401);
                assert_eq!(message, "Source Host B token expired");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(classify_error(&err), FailureKind::SessionExpired);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_token_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let backend = HttpBackend::new(start_server().await, None);

        let err = backend
            .connection_status(ProviderId::SourceHostA)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing credentials");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn listing_install_flag_in_body() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        match backend.list_resources(ProviderId::SourceHostA).await.unwrap() {
            Listing::InstallationRequired { install_url } => {
                assert_eq!(install_url, "https://source-a.example/apps/install");
            }
            other => panic!("expected install signal, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn listing_install_error_code() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        let err = backend
            .list_resources(ProviderId::SourceHostB)
            .await
            .unwrap_err();
        match err {
            BackendError::InstallationRequired {
                provider,
                install_url,
            } => {
                assert_eq!(provider, ProviderId::SourceHostB);
                assert_eq!(install_url, "https://source-b.example/install");
            }
            other => panic!("expected installation error, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn listing_items_and_empty_error_body() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        match backend.list_resources(ProviderId::VideoHost).await.unwrap() {
            Listing::Items(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0]["title"], "Sprint demo");
            }
            other => panic!("expected items, got {other:?}"),
        }

        let err = backend
            .list_resources(ProviderId::DesignHost)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status 500");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn design_preview_sends_kind() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        let preview = backend
            .design_preview("AbC123", DesignKind::Prototype)
            .await
            .unwrap();
        assert_eq!(
            preview,
            DesignPreview {
                name: "AbC123 (prototype)".into(),
                page_count: Some(4),
            }
        );

        let err = backend
            .design_preview("Missing", DesignKind::Design)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File not found");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn authorization_url_is_returned() {
    timeout(TEST_TIMEOUT, async {
        let backend = backend(&start_server().await);

        let url = backend
            .authorization_url(ProviderId::SourceHostA)
            .await
            .unwrap();
        assert_eq!(url, "https://auth.example/source_host_a?state=abc");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    timeout(TEST_TIMEOUT, async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend = backend(&format!("http://127.0.0.1:{port}"));
        let err = backend
            .connection_status(ProviderId::VideoHost)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport { .. }), "{err:?}");
        assert_eq!(classify_error(&err), FailureKind::Generic);
    })
    .await
    .expect("test timed out");
}

// ── End to end ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl ConversationSink for RecordingSink {
    async fn send_to_conversation(&self, text: String) {
        self.sent.lock().unwrap().push(text);
    }
}

async fn orchestrator(base_url: &str) -> (Arc<IntegrationOrchestrator>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = IntegrationOrchestrator::new(OrchestratorDeps {
        backend: Arc::new(backend(base_url)),
        redirects: RedirectMarkerStore::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(PageUrl::empty()),
            Duration::from_secs(300),
        ),
        design_urls: DesignUrlParser::new("design-host.com", "design-host.site"),
        conversation: sink.clone(),
        interaction: None,
        inline: None,
    });
    (orchestrator, sink)
}

#[tokio::test]
async fn provider_flows_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (orchestrator, sink) = orchestrator(&base).await;

        // Video host reports not connected.
        orchestrator.start_flow(ProviderId::VideoHost).await;
        assert_eq!(
            orchestrator.flow_state(ProviderId::VideoHost).await.step,
            FlowStep::Connect
        );

        orchestrator.start_flow(ProviderId::SourceHostA).await;
        assert_eq!(
            orchestrator.flow_state(ProviderId::SourceHostA).await.step,
            FlowStep::Install
        );
        assert!(orchestrator.flow_state(ProviderId::VideoHost).await.is_default());

        orchestrator.start_flow(ProviderId::SourceHostB).await;
        let state = orchestrator.flow_state(ProviderId::SourceHostB).await;
        assert_eq!(state.step, FlowStep::Connect);
        assert!(sink.sent.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn design_link_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (orchestrator, sink) = orchestrator(&base).await;

        orchestrator.start_flow(ProviderId::DesignHost).await;
        assert_eq!(
            orchestrator.flow_state(ProviderId::DesignHost).await.step,
            FlowStep::Select
        );

        orchestrator
            .import_url_flow("https://design-host.com/board/Wb9/Retro")
            .await
            .unwrap();

        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                "Please import my Design Host board \"Wb9 (board)\" (4 pages): https://design-host.com/board/Wb9/Retro"
                    .to_string()
            ]
        );
        assert!(orchestrator.active_provider().await.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn snapshot_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (orchestrator, _sink) = orchestrator(&base).await;

        // Source Host B fails, so its whole group stays unknown.
        let snapshot = orchestrator.check_connections().await;
        assert_eq!(snapshot.status(ProviderId::SourceHostA), None);
        assert_eq!(snapshot.status(ProviderId::DesignHost), None);
        assert_eq!(snapshot.status(ProviderId::VideoHost), Some(false));
    })
    .await
    .expect("test timed out");
}

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{CounterDownStore, TestApp};
use std::sync::Arc;
use timebill_service::services::{init_metrics, DocumentStore};
use timebill_service::startup::{router, AppState};
use tower::ServiceExt;

fn state(app: &TestApp, store: Arc<dyn DocumentStore>) -> AppState {
    AppState {
        store,
        engine: app.engine.clone(),
        catalog: app.catalog.clone(),
    }
}

async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn();

    let (status, body) = get(state(&app, app.store.clone()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "timebill-service");
}

#[tokio::test]
async fn readiness_follows_the_store() {
    let app = TestApp::spawn();
    let (status, _) = get(state(&app, app.store.clone()), "/ready").await;
    assert_eq!(status, StatusCode::OK);

    let down: Arc<dyn DocumentStore> = Arc::new(CounterDownStore {
        inner: app.memory.clone(),
    });
    let (status, _) = get(state(&app, down.clone()), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get(state(&app, down), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("unhealthy"));
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    init_metrics();
    let app = TestApp::spawn();

    let (status, body) = get(state(&app, app.store.clone()), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("timebill_partial_commits_total"));
}

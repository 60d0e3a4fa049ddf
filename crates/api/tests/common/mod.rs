use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chargewatch_core::persistence::PersistenceBackend;
use chargewatch_core::registry::StatusRegistry;
use chargewatch_core::timeline::TimelineStore;
use chargewatch_db::FileBackend;
use chargewatch_events::EventBus;
use http_body_util::BodyExt;
use tower::ServiceExt;

use chargewatch_api::config::ServerConfig;
use chargewatch_api::router::build_app_router;
use chargewatch_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        stations_file: PathBuf::from("stations.json"),
    }
}

/// Stores backed by JSON files in a temporary directory.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<StatusRegistry>,
    pub timeline: Arc<TimelineStore>,
    _dir: tempfile::TempDir,
}

/// Build the full application router with all middleware layers, mirroring
/// what `main.rs` serves.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn PersistenceBackend> = Arc::new(FileBackend::new(
        dir.path().join("timeline.json"),
        dir.path().join("state.json"),
    ));
    let registry = Arc::new(StatusRegistry::new(Arc::clone(&backend)));
    let timeline = Arc::new(TimelineStore::new(Arc::clone(&backend)));
    let config = test_config();

    let state = AppState {
        registry: Arc::clone(&registry),
        timeline: Arc::clone(&timeline),
        event_bus: Arc::new(EventBus::default()),
        backend,
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        registry,
        timeline,
        _dir: dir,
    }
}

/// Issue a GET request against the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

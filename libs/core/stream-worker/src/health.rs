//! Health check handlers for stream workers.
//!
//! This module provides reusable Axum handlers for:
//! - Liveness probes (`/health`, `/healthz`)
//! - Stream monitoring (`/stream/info`)
//! - Prometheus metrics (`/metrics`)
//!
//! Liveness only says the process is up. It deliberately does not look at
//! the consumer loop or the store.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::metrics;
use crate::store::StreamStore;

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Store used for stream monitoring.
    pub store: Arc<dyn StreamStore>,
    /// Application name.
    pub app_name: String,
    /// Application version.
    pub app_version: String,
    /// Stream name for monitoring.
    pub stream_name: String,
    /// Consumer group for monitoring.
    pub consumer_group: String,
}

impl HealthState {
    /// Create a new health state.
    pub fn new(
        store: Arc<dyn StreamStore>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            app_name: app_name.into(),
            app_version: app_version.into(),
            stream_name: config.stream_name.clone(),
            consumer_group: config.consumer_group.clone(),
        }
    }
}

/// Health response for liveness probes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status (always "healthy" if responding).
    pub status: String,
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

/// Liveness probe handler.
///
/// Always returns OK if the server is running.
pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
    })
}

/// Stream info handler for monitoring.
///
/// Reports the consumer group's pending entry count.
pub async fn stream_info_handler(
    State(state): State<HealthState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state
        .store
        .pending_count(&state.stream_name, &state.consumer_group)
        .await
    {
        Ok(pending) => Ok(Json(json!({
            "stream": state.stream_name,
            "group": state.consumer_group,
            "pending": pending,
        }))),
        Err(e) if e.is_nogroup() => Ok(Json(json!({
            "stream": state.stream_name,
            "group": state.consumer_group,
            "pending": 0,
            "message": "Consumer group does not exist yet",
        }))),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": format!("Failed to get stream info: {}", e)
            })),
        )),
    }
}

/// Prometheus metrics endpoint handler.
///
/// Returns metrics in Prometheus text format for scraping.
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics not initialized. Call metrics::init_metrics() at startup.".to_string(),
        )
            .into_response(),
    }
}

/// Create a router with the health, stream info and metrics endpoints.
pub fn health_router(state: HealthState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/stream/info", get(stream_info_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::store::{InMemoryStreamStore, MockStreamStore, StartPosition};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn json_body(body: Body) -> Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state(store: Arc<dyn StreamStore>) -> HealthState {
        HealthState::new(
            store,
            "test-worker",
            "1.0.0",
            &WorkerConfig::new("test:emails", "test:group", "c1"),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            name: "test-worker".to_string(),
            version: "1.0.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"name\":\"test-worker\""));
    }

    #[tokio::test]
    async fn test_health_ok_even_when_store_is_down() {
        let mut store = MockStreamStore::new();
        store.expect_pending_count().never();
        let app = health_router(state(Arc::new(store)));

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["name"], "test-worker");

        let response = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stream_info_reports_pending() {
        let store = Arc::new(InMemoryStreamStore::new());
        store
            .create_group("test:emails", "test:group", StartPosition::Tail)
            .await
            .unwrap();
        store
            .append("test:emails", &[("to".to_string(), "a@b.com".to_string())])
            .await
            .unwrap();
        store
            .read_group(
                "test:emails",
                "test:group",
                "c1",
                1,
                std::time::Duration::from_millis(10),
            )
            .await
            .unwrap();

        let app = health_router(state(store));
        let response = app.oneshot(get("/stream/info")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["pending"], 1);
        assert_eq!(body["group"], "test:group");
    }

    #[tokio::test]
    async fn test_stream_info_store_error_is_unavailable() {
        let mut store = MockStreamStore::new();
        store
            .expect_pending_count()
            .returning(|_, _| Err(StreamError::Closed));

        let app = health_router(state(Arc::new(store)));
        let response = app.oneshot(get("/stream/info")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

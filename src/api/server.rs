use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    commit, create_dataset, drop_dataset, health_check, list_datasets, query, record_row,
    record_rows, AppState,
};
use crate::storage::StorageEngine;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Dataset management
        .route("/v1/datasets", get(list_datasets))
        .route("/v1/datasets", post(create_dataset))
        .route("/v1/datasets/:id", delete(drop_dataset))
        // Writes
        .route("/v1/datasets/:id/rows", post(record_row))
        .route("/v1/datasets/:id/multirows", post(record_rows))
        .route("/v1/datasets/:id/commit", post(commit))
        // Query
        .route("/v1/query", get(query))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(StorageEngine::new());
    let state = Arc::new(AppState { engine });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting sparsedb server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("sparsedb server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<StorageEngine>) {
        let engine = Arc::new(StorageEngine::new());
        let state = Arc::new(AppState {
            engine: Arc::clone(&engine),
        });
        (build_router(state), engine)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = create_test_app();

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_column_named_zero() {
        let (app, _) = create_test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/datasets",
                json!({"type": "sparse.mutable", "id": "test"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/datasets/test/rows",
                json!({"rowName": "0", "columns": [["0", 0, "2015-01-01"]]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/datasets/test/rows",
                json!({"rowName": 1, "columns": [[0, 0, "2015-01-01"]]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Not committed yet
        let response = app
            .clone()
            .oneshot(get("/v1/query?q=select%20*%20from%20test&format=table"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!([["_rowName"]]));

        let response = app
            .clone()
            .oneshot(post_json("/v1/datasets/test/commit", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let expected = json!([["_rowName", "0"], ["0", 0], ["1", 0]]);

        let response = app
            .clone()
            .oneshot(get("/v1/query?q=select%20*%20from%20test&format=table"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, expected);

        let response = app
            .clone()
            .oneshot(get("/v1/query?q=select%20%220%22%20from%20test&format=table"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, expected);

        let response = app
            .oneshot(get("/v1/query?q=select%20%220%22%20from%20test&format=sparse"))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!([[["_rowName", "0"], ["0", 0]], [["_rowName", "1"], ["0", 0]]])
        );
    }

    #[tokio::test]
    async fn test_multirows() {
        let (app, engine) = create_test_app();
        engine
            .create_dataset(crate::data::DatasetConfig::sparse_mutable("m"))
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/datasets/m/multirows",
                json!([["a", [["x", 1, 0]]], ["b", [["y", 2.5, 0]]]]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"recorded": 2}));

        let response = app
            .oneshot(post_json("/v1/datasets/m/commit", json!({})))
            .await
            .unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats["row_count"], json!(2));
        assert_eq!(stats["pending_cells"], json!(0));
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(post_json(
                "/v1/datasets",
                json!({"type": "beh.mutable", "id": "x"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], json!("InvalidConfig"));
    }

    #[tokio::test]
    async fn test_undecodable_config() {
        let (app, engine) = create_test_app();

        for body in [json!({"type": "sparse.mutable"}), json!({"type": 5, "id": "x"})] {
            let response = app
                .clone()
                .oneshot(post_json("/v1/datasets", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["kind"], json!("InvalidConfig"));
            assert!(body["error"].is_string());
        }

        assert!(engine.list_datasets().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_record_body() {
        let (app, engine) = create_test_app();
        let ds = engine
            .create_dataset(crate::data::DatasetConfig::sparse_mutable("t"))
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/v1/datasets/t/rows", json!({"columns": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], json!("MalformedInput"));

        let response = app
            .oneshot(post_json("/v1/datasets/t/multirows", json!({"rows": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], json!("MalformedInput"));
        assert_eq!(ds.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_query_without_sql() {
        let (app, _) = create_test_app();

        let response = app.oneshot(get("/v1/query?format=table")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], json!("InvalidQuery"));
    }

    #[tokio::test]
    async fn test_timestamp_value_round_trip() {
        let (app, engine) = create_test_app();
        engine
            .create_dataset(crate::data::DatasetConfig::sparse_mutable("t"))
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/datasets/t/rows",
                json!({
                    "rowName": "r",
                    "columns": [["when", {"ts": "2015-01-01T00:00:00Z"}, "2015-01-02"]]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        app.clone()
            .oneshot(post_json("/v1/datasets/t/commit", json!({})))
            .await
            .unwrap();

        let response = app
            .oneshot(get("/v1/query?q=select%20*%20from%20t&format=aos"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{"_rowName": "r", "when": "2015-01-01T00:00:00.000Z"}])
        );
    }

    #[tokio::test]
    async fn test_invalid_query() {
        let (app, engine) = create_test_app();
        engine
            .create_dataset(crate::data::DatasetConfig::sparse_mutable("t"))
            .unwrap();

        let response = app
            .clone()
            .oneshot(get("/v1/query?q=select%20*%20from%20t%20where%20x%20%3D%201"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], json!("InvalidQuery"));

        let response = app
            .oneshot(get("/v1/query?q=select%20*%20from%20t&format=csv"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_cell_rejected() {
        let (app, engine) = create_test_app();
        let ds = engine
            .create_dataset(crate::data::DatasetConfig::sparse_mutable("t"))
            .unwrap();

        let response = app
            .oneshot(post_json(
                "/v1/datasets/t/rows",
                json!({"rowName": "r", "columns": [["a", 1, 0], ["b", [1], 0]]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], json!("InvalidValueType"));
        assert_eq!(ds.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_dataset() {
        let (app, _) = create_test_app();

        let response = app
            .clone()
            .oneshot(post_json("/v1/datasets/nonexistent/commit", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(get("/v1/query?q=select%20*%20from%20nonexistent"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_and_drop() {
        let (app, engine) = create_test_app();
        engine
            .create_dataset(crate::data::DatasetConfig::sparse_mutable("d"))
            .unwrap();

        let response = app.clone().oneshot(get("/v1/datasets")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["datasets"][0]["id"], json!("d"));
        assert_eq!(body["datasets"][0]["type"], json!("sparse.mutable"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/datasets/d")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(engine.get_dataset("d").is_none());
    }
}

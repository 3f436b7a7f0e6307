use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{DatasetConfig, DatasetError, DatasetStats};
use crate::query::{run_query_formatted, ExecuteError, QueryError};
use crate::storage::{StorageEngine, StorageError};

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<StorageEngine>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Dataset Management
// ============================================================================

#[derive(Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<DatasetStats>,
}

pub async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<DatasetsResponse> {
    Json(DatasetsResponse {
        datasets: state.engine.all_dataset_stats(),
    })
}

#[derive(Serialize)]
pub struct CreateDatasetResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created: bool,
}

pub async fn create_dataset(
    State(state): State<Arc<AppState>>,
    config: Result<Json<DatasetConfig>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateDatasetResponse>), ApiError> {
    let Json(config) = config.map_err(|e| ApiError::rejected("InvalidConfig", e))?;
    let dataset = state.engine.create_dataset(config)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDatasetResponse {
            id: dataset.config.id.clone(),
            kind: dataset.config.kind.clone(),
            created: true,
        }),
    ))
}

pub async fn drop_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.drop_dataset(&id)?;
    Ok(Json(serde_json::json!({ "dropped": id })))
}

// ============================================================================
// Record / Commit
// ============================================================================

#[derive(Deserialize)]
pub struct RecordRowRequest {
    #[serde(rename = "rowName")]
    pub row_name: serde_json::Value,
    pub columns: Vec<serde_json::Value>,
}

pub async fn record_row(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Result<Json<RecordRowRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::rejected("MalformedInput", e))?;
    let dataset = state.engine.dataset(&id)?;
    dataset.record_row_json(&request.row_name, &request.columns)?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
pub struct RecordRowsResponse {
    pub recorded: usize,
}

/// Body is `[[rowName, [[column, value, ts], ...]], ...]`
pub async fn record_rows(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    rows: Result<Json<Vec<serde_json::Value>>, JsonRejection>,
) -> Result<Json<RecordRowsResponse>, ApiError> {
    let Json(rows) = rows.map_err(|e| ApiError::rejected("MalformedInput", e))?;
    let dataset = state.engine.dataset(&id)?;
    let recorded = dataset.record_rows_json(&rows)?;
    Ok(Json(RecordRowsResponse { recorded }))
}

pub async fn commit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DatasetStats>, ApiError> {
    let dataset = state.engine.dataset(&id)?;
    dataset.commit()?;
    Ok(Json(dataset.stats()))
}

// ============================================================================
// Query
// ============================================================================

#[derive(Deserialize)]
pub struct QueryParams {
    pub q: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "table".to_string()
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::rejected("InvalidQuery", e))?;
    let output = run_query_formatted(&state.engine, &params.q, &params.format)?;
    Ok(Json(output))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    NotFound(String),
    Conflict(&'static str, String),
}

impl ApiError {
    /// Input the extractors could not decode
    fn rejected(kind: &'static str, rejection: impl std::fmt::Display) -> Self {
        ApiError::BadRequest(kind, rejection.to_string())
    }
}

impl From<DatasetError> for ApiError {
    fn from(err: DatasetError) -> Self {
        let kind = match &err {
            DatasetError::InvalidColumnKey(_) => "InvalidColumnKey",
            DatasetError::InvalidRowName(_) => "InvalidRowName",
            DatasetError::InvalidValueType(_) => "InvalidValueType",
            DatasetError::InvalidTimestamp(_) => "InvalidTimestamp",
            DatasetError::MalformedCell(_) | DatasetError::MalformedRow(_) => "MalformedInput",
            DatasetError::CommitConflict(_) => {
                return ApiError::Conflict("CommitConflict", err.to_string())
            }
        };
        ApiError::BadRequest(kind, err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidConfig(_) => ApiError::BadRequest("InvalidConfig", err.to_string()),
            StorageError::DatasetExists(_) => ApiError::Conflict("DatasetExists", err.to_string()),
            StorageError::UnknownDataset(_) => ApiError::NotFound(err.to_string()),
            StorageError::Dataset(inner) => inner.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Execute(ExecuteError::UnknownDataset(_)) => ApiError::NotFound(err.to_string()),
            QueryError::InvalidQuery(_) | QueryError::UnknownFormat(_) => {
                ApiError::BadRequest("InvalidQuery", err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(kind, msg) => (StatusCode::BAD_REQUEST, kind, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "UnknownDataset", msg),
            ApiError::Conflict(kind, msg) => (StatusCode::CONFLICT, kind, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": kind,
        });

        (status, Json(body)).into_response()
    }
}

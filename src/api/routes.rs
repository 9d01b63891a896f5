//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<PredictionService>`.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use crate::backtest::BacktestResult;
use crate::engine::{
    BacktestRequest, PredictRequest, PredictResponse, PredictionService, ServiceError,
    StatusResponse,
};
use crate::history::RawRecord;
use crate::storage::StoredRecord;

pub type AppState = Arc<PredictionService>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub ingested: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub take: Option<usize>,
}

/// Pull the record list out of `{"list": [...]}` or `{"data": {"list": [...]}}`.
pub fn extract_list(body: &Value) -> Option<&Vec<RawRecord>> {
    fn non_empty(v: &&Value) -> bool {
        v.as_array().is_some_and(|l| !l.is_empty())
    }
    body.get("list")
        .filter(non_empty)
        .or_else(|| body.get("data")?.get("list").filter(non_empty))
        .and_then(Value::as_array)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Service errors rendered as JSON responses.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            ServiceError::Predict(e) => {
                warn!(error = %e, "Request rejected");
                let mut body = json!({ "error": e.to_string() });
                if let Some(have) = e.available() {
                    body["have"] = json!(have);
                }
                (StatusCode::BAD_REQUEST, body)
            }
            ServiceError::InvalidRequest(msg) => {
                warn!(error = %msg, "Invalid request");
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            ServiceError::Storage(e) => {
                error!(error = %format!("{e:#}"), "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "storage failure" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.status())
}

/// POST /api/ingest
pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<IngestResponse> {
    let records = extract_list(&body)
        .ok_or_else(|| ServiceError::InvalidRequest("no list found".into()))?;
    let ingested = state.ingest(records).await?;
    Ok(Json(IngestResponse { ingested }))
}

/// GET /api/history?take=N
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<StoredRecord>> {
    let rows = state.history(query.take).await?;
    Ok(Json(rows.into_vec()))
}

/// Parse an optional JSON request body. An empty body means defaults;
/// anything else must deserialize.
pub fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::InvalidRequest(format!("invalid request body: {e}")))
}

/// POST /api/predict
///
/// An empty body means "predict from storage with defaults".
pub async fn predict(State(state): State<AppState>, body: Bytes) -> ApiResult<PredictResponse> {
    let req: PredictRequest = parse_body(&body)?;
    Ok(Json(state.predict(&req).await?))
}

/// POST /api/backtest
pub async fn backtest(State(state): State<AppState>, body: Bytes) -> ApiResult<BacktestResult> {
    let req: BacktestRequest = parse_body(&body)?;
    Ok(Json(state.backtest(&req).await?))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Copyright 2025 Readygraph (https://github.com/readygraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP handlers for the two core operations plus health.
//!
//! Client mistakes surface with their reason; anything else becomes an
//! opaque 500 with the detail kept in the server log.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use readygraph_cache::CacheStats;
use readygraph_core::ReadygraphError;
use readygraph_engine::{GraphProjection, InferenceEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ReadygraphError> for ApiError {
    fn from(e: ReadygraphError) -> Self {
        match e {
            ReadygraphError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ReadygraphError::NotFound(msg) => ApiError::NotFound(msg),
            other => {
                error!(error = %other, "request failed");
                ApiError::Internal
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub student_id: String,
    pub target_code: String,
    #[serde(default = "default_level")]
    pub level: i64,
}

fn default_level() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub student_id: String,
    pub target_code: String,
    pub level: i64,
    pub ready: bool,
    pub readiness_score: f32,
    pub history_steps: usize,
    pub degraded_steps: usize,
}

/// POST /predict_readiness
pub async fn predict_readiness(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    debug!(
        student_id = %request.student_id,
        target_code = %request.target_code,
        level = request.level,
        "predict_readiness"
    );

    let readiness = state
        .engine
        .run_inference(&request.student_id, &request.target_code, request.level)
        .await?;

    Ok(Json(PredictResponse {
        student_id: request.student_id,
        target_code: request.target_code,
        level: request.level,
        ready: readiness.ready,
        readiness_score: (readiness.probability * 10_000.0).round() / 10_000.0,
        history_steps: readiness.history_steps,
        degraded_steps: readiness.degraded_steps,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub student_id: String,
}

/// GET /graph/{target_code}?student_id=...
pub async fn project_graph(
    State(state): State<AppState>,
    Path(target_code): Path<String>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<GraphProjection>, ApiError> {
    debug!(student_id = %query.student_id, %target_code, "project_graph");
    let projection = state
        .engine
        .project_graph(&query.student_id, &target_code)
        .await?;
    Ok(Json(projection))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache: CacheStats,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: state.engine.cache().stats(),
    })
}

//! HTTP surface
//!
//! | route                   | purpose                                   |
//! |-------------------------|-------------------------------------------|
//! | `GET /`                 | plain-text liveness with the project id   |
//! | `GET /health`           | database connectivity probe               |
//! | `GET /ingest/status`    | per-dataset state and last run summary    |
//! | `POST /ingest/:dataset` | start a run now                           |

pub mod response;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::db;
use crate::error::ApiError;
use crate::ingest::{DatasetStatus, IngestScheduler};
use crate::middleware;
use response::{ApiResponse, TriggerAccepted};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub scheduler: IngestScheduler,
    pub project_id: Arc<str>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ingest/status", get(ingest_status))
        .route("/ingest/:dataset", post(trigger_ingest))
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    format!(
        "CBI data collection microservices have started for {}!\n",
        state.project_id
    )
}

async fn health(State(state): State<AppState>) -> Response {
    match db::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "database": "unreachable"
                })),
            )
                .into_response()
        },
    }
}

async fn ingest_status(State(state): State<AppState>) -> ApiResponse<Vec<DatasetStatus>> {
    ApiResponse::success(state.scheduler.statuses().await)
}

async fn trigger_ingest(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Response, ApiError> {
    // The run outlives the request; its result lands in /ingest/status.
    let _detached = state.scheduler.trigger(&dataset)?;

    tracing::info!(dataset = %dataset, "Ingestion run triggered");

    Ok(ApiResponse::success(TriggerAccepted {
        dataset,
        status: "accepted",
    })
    .with_status(StatusCode::ACCEPTED))
}

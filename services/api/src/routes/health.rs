//! Health check endpoint

use std::time::Instant;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

const SERVICE_NAME: &str = "warden-api";

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    #[serde(default)]
    pub detailed: bool,
}

/// `?detailed=true` also probes the database and answers 503 when it is down
pub async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> impl IntoResponse {
    if !query.detailed {
        return (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": SERVICE_NAME,
            })),
        );
    }

    let started = Instant::now();
    let database_ok = matches!(common::database::health_check(&state.db_pool).await, Ok(true));
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let (status, label, message) = if database_ok {
        (StatusCode::OK, "healthy", "Database connection successful")
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "unhealthy",
            "Database connection failed",
        )
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": SERVICE_NAME,
            "checks": {
                "database": {
                    "status": database_ok,
                    "message": message,
                    "response_time_ms": elapsed_ms,
                }
            }
        })),
    )
}

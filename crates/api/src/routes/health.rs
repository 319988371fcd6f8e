//! Health endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::ApiError;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health - database connectivity probe
async fn health(State(ctx): State<Arc<AppContext>>) -> Result<Json<HealthResponse>, ApiError> {
    ctx.db.health_check()?;
    Ok(Json(HealthResponse { status: "ok" }))
}

//! HTTP routes and error mapping

pub mod calendar;
pub mod health;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use trellis_domain::TrellisError;

use crate::context::AppContext;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert domain errors to HTTP responses
pub struct ApiError(TrellisError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            TrellisError::Validation(_) => StatusCode::BAD_REQUEST,
            TrellisError::Auth(_) => StatusCode::UNAUTHORIZED,
            TrellisError::NotFound(_) => StatusCode::NOT_FOUND,
            TrellisError::ProviderFetch { .. } | TrellisError::Network(_) => {
                StatusCode::BAD_GATEWAY
            }
            TrellisError::Persistence(_)
            | TrellisError::Config(_)
            | TrellisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse { error: self.0.to_string() });
        (status, body).into_response()
    }
}

impl From<TrellisError> for ApiError {
    fn from(err: TrellisError) -> Self {
        Self(err)
    }
}

/// Build the full application router.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(calendar::router())
        .with_state(ctx)
        .layer(cors)
}

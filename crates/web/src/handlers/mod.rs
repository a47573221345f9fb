use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use ci_analyzer_core::AppError;
use tower_http::timeout::TimeoutLayer;

use crate::AppState;

mod api;
mod webhook;


pub fn build_router() -> Router<AppState> {
    // Pipelines run inside the webhook request, so only queries are time-limited.
    let queries = Router::new()
        .route("/api/analyses/{repo_id}", get(api::get_analyses))
        .route("/api/predictions/{repo_id}", get(api::get_predictions))
        .route("/api/status", get(api::get_status))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(120),
        ));
    Router::new()
        .route("/api/github/webhook", post(webhook::webhook))
        .route("/api/webhooks/github", post(webhook::webhook))
        .merge(queries)
        .fallback(not_found)
}

async fn not_found() -> AppError { AppError::Status(StatusCode::NOT_FOUND) }

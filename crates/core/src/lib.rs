pub mod config;
pub mod models;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub enum AppError {
    Status(StatusCode),
    /// Rejected with a plain-text reason.
    BadRequest(&'static str),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Status(status) if status == StatusCode::NOT_FOUND => {
                (status, "Not found").into_response()
            }
            Self::Status(status) => status.into_response(),
            Self::BadRequest(reason) => {
                tracing::warn!("Rejected request: {}", reason);
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
            Self::Internal(err) => {
                tracing::error!("{:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", err))
                    .into_response()
            }
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self { Self::Internal(err.into()) }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    /// Login rejection. Deliberately carries no detail about which half of
    /// the credential pair was wrong.
    #[error("Invalid credentials")]
    Unauthorized,

    /// External AI call failed. The cause is logged where it happened; the
    /// client only sees the generic message.
    #[error("{0}")]
    Upstream(&'static str),

    #[error("{0}")]
    Internal(&'static str),
}

impl AppError {
    /// Logs the underlying failure and replaces it with a generic 500
    /// message for the client.
    pub fn internal<E: std::fmt::Display>(message: &'static str) -> impl FnOnce(E) -> AppError {
        move |err| {
            error!("{message}: {err}");
            AppError::Internal(message)
        }
    }

    pub fn upstream<E: std::fmt::Display>(message: &'static str) -> impl FnOnce(E) -> AppError {
        move |err| {
            error!("AI service error: {err}");
            AppError::Upstream(message)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Forbidden, not authorized as an admin")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Asset IO error: {0}")]
    AssetIo(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } | AppError::Conflict { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Store { .. }
            | AppError::AssetIo { .. }
            | AppError::Encoding { .. }
            | AppError::Token { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internals are logged server-side, never sent to the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{self}");
            "Internal server error.".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

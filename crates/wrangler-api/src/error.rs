use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use wrangler_core::WranglerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Wrangler(#[from] WranglerError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Wrangler(e) => match e {
                WranglerError::NotFound { .. } => StatusCode::NOT_FOUND,
                WranglerError::PermissionDenied(_) | WranglerError::NotAllowed(_) => {
                    StatusCode::FORBIDDEN
                }
                WranglerError::InvalidMerge(_)
                | WranglerError::InvalidAttach(_)
                | WranglerError::SelfTarget(_)
                | WranglerError::SystemMessageIneligible(_)
                | WranglerError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
                WranglerError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
                WranglerError::PartialFailure { .. } | WranglerError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Wrangler(e) => e.code(),
            Self::Join(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Wrangler(WranglerError::Internal(_)) | Self::Join(_) => {
                error!("Request failed: {}", self);
                "internal error".to_string()
            }
            other => {
                if status.is_server_error() {
                    error!("Request failed: {}", other);
                }
                other.to_string()
            }
        };
        (
            status,
            Json(json!({ "error": message, "code": self.code() })),
        )
            .into_response()
    }
}

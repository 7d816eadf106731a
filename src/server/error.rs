use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::merge::{FeedOrigin, SourceLabels};
use crate::render::RenderError;
use crate::service::MergeError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum AppError {
    /// An upstream feed answered with an error status, passed through as is.
    #[error("{detail}")]
    Upstream { status: StatusCode, detail: String },

    #[error("Error serving feed: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps a merge failure to a response, naming the failing feed by label.
    pub fn from_merge(err: MergeError, labels: &SourceLabels) -> Self {
        let status = err
            .upstream_status()
            .map(|code| StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY));

        match (&err, status) {
            (MergeError::Upstream { origin, .. }, Some(status)) => {
                let detail = match origin {
                    FeedOrigin::Public => format!("Error fetching {}", labels.public),
                    FeedOrigin::Personal => {
                        format!("Error fetching {}. Auth token correct?", labels.personal)
                    }
                };
                AppError::Upstream { status, detail }
            }
            _ => AppError::Internal(err.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Upstream { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Upstream { .. } => tracing::warn!(status = %status, "Upstream feed error"),
            AppError::Internal(e) => tracing::error!("Feed error: {}", e),
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::services::UpstreamFailure;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("upstream unavailable")]
    UpstreamUnavailable { status: Option<u16>, detail: String },

    #[error("upstream returned errors")]
    UpstreamError(Value),
}

impl From<UpstreamFailure> for ApiError {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Unavailable { status, detail } => {
                ApiError::UpstreamUnavailable { status, detail }
            }
            UpstreamFailure::Rejected(errors) => ApiError::UpstreamError(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::MissingParameter(_) | ApiError::InvalidParameter(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::UpstreamUnavailable { status, detail } => {
                tracing::error!("Upstream unavailable ({:?}): {}", status, detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message, "status": status, "details": detail }),
                )
            }
            ApiError::UpstreamError(errors) => {
                tracing::error!("Upstream returned errors: {}", errors);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message, "details": errors }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

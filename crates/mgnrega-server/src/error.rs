//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::upstream::UpstreamError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(UpstreamError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(UpstreamError::BadResponse { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Upstream(UpstreamError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::BadRequest(msg) => ErrorBody {
                error: "Invalid query".into(),
                details: Some(msg.clone()),
            },
            ApiError::Upstream(UpstreamError::Configuration(msg)) => ErrorBody {
                error: "Upstream API is not configured".into(),
                details: Some(msg.clone()),
            },
            ApiError::Upstream(UpstreamError::Unavailable(msg)) => ErrorBody {
                error: "Upstream API unavailable".into(),
                details: Some(msg.clone()),
            },
            // Raw upstream body, for diagnosis
            ApiError::Upstream(UpstreamError::BadResponse { status, body }) => ErrorBody {
                error: format!("Upstream API returned status {status}"),
                details: (!body.is_empty()).then(|| body.clone()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "rejected request");
        }
        (status, Json(self.body())).into_response()
    }
}

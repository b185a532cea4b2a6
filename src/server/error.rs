//! HTTP error responses
//!
//! Every failure leaves a handler as `{"detail": "<message>"}` with the
//! matching status code.

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ApiError {
    /// An expected artifact is missing
    #[error("{0}")]
    NotFound(String),
    /// Malformed or out-of-range request input
    #[error("{0}")]
    BadRequest(String),
    /// Read, parse or inference failure, or no model loaded
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(message) => error!("Request failed: {}", message),
            other => debug!("Request rejected ({}): {}", status, other),
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

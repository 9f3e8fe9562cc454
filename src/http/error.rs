//! Caller-facing relay errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Reasons a `/proxy` call is rejected before any downstream traffic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// `method` or `url` missing, or the body is not a relay request.
    #[error("bad params")]
    BadParams,

    #[error("unsupported method")]
    UnsupportedMethod(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

//! Application error type mapping to HTTP status codes.
//!
//! Every error leaves as a plain JSON body `{"error": "<message>"}`; none of
//! these are ever written once an SSE response has started.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use fencecast_types::error::RelayError;

pub const INVALID_BODY_MESSAGE: &str = "Invalid request body: messages array is required.";
pub const SETUP_FAILED_MESSAGE: &str = "Internal Server Error during stream setup";

#[derive(Debug)]
pub enum AppError {
    /// Request body failed to parse or validate.
    BadRequest(String),
    /// Opening the upstream stream failed.
    Relay(RelayError),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        AppError::Relay(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Relay(RelayError::UpstreamStatus { status, body }) => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                format!("Upstream API error: {body}"),
            ),
            AppError::Relay(e) => {
                tracing::error!(error = %e, "stream setup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, SETUP_FAILED_MESSAGE.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

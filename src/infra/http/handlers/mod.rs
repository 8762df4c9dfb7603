pub mod posts;
pub mod service;
pub mod users;

use axum::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use super::error::ApiError;

/// Empty 200 telling the cache layer to serve the body it already holds.
pub(super) fn reuse_cached() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
    )
        .into_response()
}

/// Malformed ids are reported as missing resources.
pub(super) fn parse_id(raw: &str, message: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(message))
}

//! HTTP response types and utilities
//!
//! Every JSON endpoint answers with a `success` flag. Successful payloads are
//! flattened next to it; failures carry a single `message`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult, SourceError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Helper function to convert AppResult to HTTP response
pub fn handle_result<T: Serialize>(result: AppResult<T>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(error) => handle_error(error),
    }
}

/// Status code an error is reported with.
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation { .. } | AppError::Resolution { .. } => StatusCode::BAD_REQUEST,
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::OperationInProgress { .. } => StatusCode::CONFLICT,
        AppError::Source(source) => match source {
            SourceError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            SourceError::UnsupportedType { .. } => StatusCode::BAD_REQUEST,
            SourceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        },
        AppError::Http(_) => StatusCode::BAD_GATEWAY,
        AppError::Repository(_) | AppError::Configuration { .. } | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let status = status_for(&error);
    let message = match &error {
        AppError::Validation { message } | AppError::Resolution { message } => message.clone(),
        AppError::NotFound { resource, id } => format!("{resource} with id '{id}' not found"),
        AppError::Repository(_) => "Data access failed".to_string(),
        _ => error.to_string(),
    };

    if status.is_server_error() {
        warn!("Request failed with {}: {}", status, error);
    } else {
        debug!("Request rejected with {}: {}", status, error);
    }

    (status, Json(ApiError::new(message))).into_response()
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiError::new(message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::not_found("playlist", "p1"), StatusCode::NOT_FOUND)]
    #[case(AppError::resolution("No valid URL found in cmd"), StatusCode::BAD_REQUEST)]
    #[case(AppError::operation_in_progress("catalog sync", "p1"), StatusCode::CONFLICT)]
    #[case(
        AppError::Source(SourceError::auth_failed("xtream", "inactive")),
        StatusCode::UNAUTHORIZED
    )]
    #[case(
        AppError::Source(SourceError::UnsupportedType { playlist_type: "ftp".into() }),
        StatusCode::BAD_REQUEST
    )]
    #[case(
        AppError::Source(SourceError::Connection { url: "http://x".into(), message: "refused".into() }),
        StatusCode::BAD_GATEWAY
    )]
    #[case(AppError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_errors_to_status(#[case] error: AppError, #[case] expected: StatusCode) {
        assert_eq!(status_for(&error), expected);
    }

    #[test]
    fn success_payload_is_flattened() {
        #[derive(Serialize)]
        struct Payload {
            url: String,
        }
        let body = serde_json::to_value(ApiResponse::success(Payload {
            url: "http://a".into(),
        }))
        .unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "url": "http://a" }));
    }
}

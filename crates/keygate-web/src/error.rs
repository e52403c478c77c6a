use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use keygate_core::{AuthError, CoreError, FieldError};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    InvalidCredentials,
    Auth(AuthError),
    RateLimited { retry_after: Duration },
    LimiterUnavailable,
    Unavailable(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    reason: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

/// Whole seconds, rounded up so clients never retry early.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut errors = Vec::new();
        let mut retry_after = None;

        let (status, reason, message) = match self {
            AppError::Validation(fields) => {
                errors = fields;
                (StatusCode::BAD_REQUEST, "validation_failed", "Validation failed".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                "invalid_credentials",
                "Invalid credentials".to_string(),
            ),
            AppError::Auth(err) => {
                let message = match err {
                    AuthError::MissingToken => "Missing authorization token",
                    AuthError::MalformedToken | AuthError::ExpiredToken => "Invalid or expired token",
                };
                (StatusCode::UNAUTHORIZED, "unauthorized", message.to_string())
            }
            AppError::RateLimited { retry_after: after } => {
                retry_after = Some(retry_after_secs(after));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limit_exceeded",
                    "Too many requests".to_string(),
                )
            }
            AppError::LimiterUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "rate_limiter_unavailable",
                "Service temporarily unavailable".to_string(),
            ),
            AppError::Unavailable(detail) => {
                tracing::error!("Dependency unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Service temporarily unavailable".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Internal(detail) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
            reason,
            errors,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(fields) => AppError::Validation(fields),
            CoreError::InvalidCredentials => AppError::InvalidCredentials,
            CoreError::Auth(err) => AppError::Auth(err),
            CoreError::Unavailable(detail) => AppError::Unavailable(detail),
            other @ (CoreError::Token(_) | CoreError::Hashing(_) | CoreError::Config(_)) => {
                AppError::Internal(other.to_string())
            }
        }
    }
}

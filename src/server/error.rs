use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::VersoError;

/// Error returned by HTTP handlers.
///
/// Wraps [`VersoError`] for domain failures and adds request-shape errors
/// (malformed JSON, bad path ids, missing query parameters).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] VersoError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Domain(err) => match err {
                VersoError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                VersoError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                err if err.is_not_found() => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                other => {
                    tracing::error!(error = %other, "Internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.classify();
        (status, Json(ErrorResponse { error, code })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: VersoError) -> (StatusCode, &'static str) {
        let (status, code, _) = ApiError::from(err).classify();
        (status, code)
    }

    #[test]
    fn test_domain_error_mapping() {
        assert_eq!(
            status_of(VersoError::Validation("x".into())),
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        );
        assert_eq!(
            status_of(VersoError::version_not_found("doc", 3)),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            status_of(VersoError::TagNotFound("v1".into())),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            status_of(VersoError::Conflict("x".into())),
            (StatusCode::CONFLICT, "CONFLICT")
        );
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let (status, code, message) =
            ApiError::from(VersoError::Storage("disk on fire".into())).classify();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("disk"));
    }
}

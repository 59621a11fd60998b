//! The provider-wire error taxonomy (spec.md §7) and its JSON envelope (§4.8).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors a request handler can fail with. Each variant maps to exactly one
/// HTTP status and `reason` string.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ConditionNotMet(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("runtime error: {0}")]
    Runtime(#[from] runtime::DockerError),

    #[error("config error: {0}")]
    Config(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ConditionNotMet(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) | ApiError::Runtime(_) | ApiError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn reason(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "invalid",
            StatusCode::NOT_FOUND => "notFound",
            StatusCode::CONFLICT => "conflict",
            StatusCode::PRECONDITION_FAILED => "conditionNotMet",
            StatusCode::NOT_IMPLEMENTED => "unsupported",
            _ => "internalError",
        }
    }

    /// Client-facing message. Runtime/Config/Internal detail is logged in
    /// full server-side but never echoed verbatim to the caller.
    fn public_message(&self) -> String {
        match self {
            ApiError::Runtime(_) => "container runtime unavailable".to_string(),
            ApiError::Config(_) => "internal configuration error".to_string(),
            ApiError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
    errors: Vec<ErrorItem>,
}

#[derive(Serialize)]
struct ErrorItem {
    message: String,
    domain: &'static str,
    reason: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.reason();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(reason, status = status.as_u16(), detail = %self, "request failed");
        } else {
            tracing::warn!(reason, status = status.as_u16(), detail = %self, "request failed");
        }

        let message = self.public_message();
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: status.as_u16(),
                message: message.clone(),
                errors: vec![ErrorItem { message, domain: "global", reason }],
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_maps_to_400_and_invalid_reason() {
        let err = ApiError::Invalid("bad bucket name".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.reason(), "invalid");
    }

    #[test]
    fn condition_not_met_maps_to_412() {
        let err = ApiError::ConditionNotMet("generation mismatch".into());
        assert_eq!(err.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(err.reason(), "conditionNotMet");
    }

    #[test]
    fn internal_hides_detail_from_public_message() {
        let err = ApiError::Internal("disk full at /var/lib/docktail".into());
        assert_eq!(err.public_message(), "internal error");
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorBody;

/// Errors produced while handling a request.
///
/// The core only classifies; the HTTP status for each kind is decided in
/// [`ApiError::status`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MissingIdentity(String),
    #[error("{0}")]
    InvalidRole(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn missing_identity(message: impl Into<String>) -> Self {
        Self::MissingIdentity(message.into())
    }

    pub fn invalid_role(message: impl Into<String>) -> Self {
        Self::InvalidRole(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind used in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingIdentity(_) => "missing_identity",
            ApiError::InvalidRole(_) => "invalid_role",
            ApiError::InvalidArgument(_) => "invalid_argument",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRole(_) | ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "store operation failed");
        ApiError::Internal("internal store error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::missing_identity("x").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::invalid_role("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::invalid_argument("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::internal("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_are_internal_and_hide_details() {
        let err = ApiError::from(anyhow::anyhow!("connection refused to 10.0.0.5"));
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(!err.to_string().contains("10.0.0.5"));
    }
}

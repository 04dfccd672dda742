/// Unified error types for the PBMap auth service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the auth service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors outside a unit of work
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Provider credential rejected, expired, unreachable or malformed
    #[error("Provider verification failed: {0}")]
    ProviderVerificationFailed(String),

    /// Provider name not in the supported set
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Store error while creating a user from a social identity
    #[error("Failed to sync user: {0}")]
    UserSyncFailed(String),

    /// Signing an application token failed
    #[error("Failed to issue token: {0}")]
    TokenIssuanceFailed(String),

    /// Refresh token unknown or already consumed
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Refresh token past its absolute expiry
    #[error("Refresh token expired")]
    RefreshTokenExpired,

    /// A write inside the device/session unit of work failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate social account)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Ephemeral cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// True when the underlying store rejected a write on a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ApiError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::ProviderVerificationFailed(_) => (
                StatusCode::UNAUTHORIZED,
                "ProviderVerificationFailed",
                self.to_string(),
            ),
            ApiError::UnsupportedProvider(_) => (
                StatusCode::BAD_REQUEST,
                "UnsupportedProvider",
                self.to_string(),
            ),
            ApiError::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "InvalidRefreshToken",
                self.to_string(),
            ),
            ApiError::RefreshTokenExpired => (
                StatusCode::UNAUTHORIZED,
                "RefreshTokenExpired",
                self.to_string(),
            ),
            ApiError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            ApiError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            ApiError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Conflict",
                self.to_string(),
            ),
            // Surfaced verbatim so operators can see which store write failed
            ApiError::UserSyncFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UserSyncFailed",
                self.to_string(),
            ),
            ApiError::TokenIssuanceFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TokenIssuanceFailed",
                "Failed to issue token".to_string(),
            ),
            ApiError::TransactionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TransactionFailed",
                "Login could not be completed, please retry".to_string(),
            ),
            ApiError::Database(_) | ApiError::Cache(_) | ApiError::Internal(_) | ApiError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for auth service operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_errors_are_unauthorized() {
        let response = ApiError::InvalidRefreshToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::RefreshTokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::UnsupportedProvider("facebook".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ProviderVerificationFailed("bad signature".into())
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::TransactionFailed("disk full".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!ApiError::Conflict("x".into()).is_unique_violation());
        assert!(!ApiError::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }
}

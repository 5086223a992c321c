//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::app_error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::db::DbError;
use platform::kv::KvError;
use platform::password::{PasswordHashError, PasswordPolicyError};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad structure, bad signature or wrong algorithm
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token has expired")]
    ExpiredToken,

    /// Refresh token that is expired, malformed, or no longer in the store
    #[error("Invalid token")]
    InvalidToken,

    /// Access token with no live mapping in the store
    #[error("Token expired or not found")]
    InvalidOrExpiredToken,

    #[error("Key-value store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Token signing failed: {0}")]
    SigningError(String),

    #[error("Blog is not installed yet")]
    ServiceNotReady,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("One-time token does not exist or has expired")]
    InvalidOneTimeToken,

    #[error("One-time token does not match the request path")]
    OneTimeTokenPathMismatch,

    #[error("User not found")]
    UserNotFound,

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Account has expired")]
    AccountExpired,

    #[error("Blog is already installed")]
    AlreadyInstalled,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::InvalidToken
            | AuthError::InvalidOrExpiredToken
            | AuthError::Unauthenticated
            | AuthError::UserNotFound
            | AuthError::InvalidCredentials => ErrorKind::Unauthorized,
            AuthError::ServiceNotReady
            | AuthError::InvalidOneTimeToken
            | AuthError::OneTimeTokenPathMismatch
            | AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::AccountExpired => ErrorKind::Forbidden,
            AuthError::AlreadyInstalled => ErrorKind::Conflict,
            AuthError::StoreUnavailable(_) => ErrorKind::ServiceUnavailable,
            AuthError::SigningError(_) | AuthError::Database(_) | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AuthError::SigningError(_) => "SIGNING_ERROR",
            AuthError::ServiceNotReady => "SERVICE_NOT_READY",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::InvalidOneTimeToken => "INVALID_ONE_TIME_TOKEN",
            AuthError::OneTimeTokenPathMismatch => "ONE_TIME_TOKEN_PATH_MISMATCH",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountExpired => "ACCOUNT_EXPIRED",
            AuthError::AlreadyInstalled => "ALREADY_INSTALLED",
            AuthError::Validation(_) => "VALIDATION_FAILED",
            AuthError::Database(_) => "DATABASE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Server-side details stay in the logs.
    pub fn to_app_error(&self) -> AppError {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::InternalServerError => "Internal server error".to_string(),
            ErrorKind::ServiceUnavailable => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        };

        let err = AppError::new(kind, message).with_code(self.code());
        match self {
            AuthError::ServiceNotReady => err.with_action("Install the blog first"),
            AuthError::Unauthenticated
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidToken => err.with_action("Sign in again"),
            _ => err,
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::StoreUnavailable(reason) => {
                tracing::error!(reason = %reason, "Key-value store unavailable");
            }
            AuthError::SigningError(reason) => {
                tracing::error!(reason = %reason, "Token signing failed");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::MalformedToken | AuthError::OneTimeTokenPathMismatch => {
                tracing::warn!(error = %self, "Suspicious auth request");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<KvError> for AuthError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::Unavailable(reason) => AuthError::StoreUnavailable(reason),
            decode @ KvError::Decode { .. } => AuthError::Internal(decode.to_string()),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(DbError::Sqlx(err))
    }
}

impl From<PasswordPolicyError> for AuthError {
    fn from(err: PasswordPolicyError) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<PasswordHashError> for AuthError {
    fn from(err: PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

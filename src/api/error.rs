use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::auth_service::AuthError;
use crate::services::password::PolicyViolation;
use crate::services::password_service::PasswordError;

#[derive(Debug)]
pub enum ApiError {
    EmailAlreadyExists,

    InvalidCredentials,

    /// Wrong current password on a self-service change. Not folded into
    /// `InvalidCredentials`; the caller is already authenticated.
    IncorrectPassword,

    InvalidToken,

    WeakPassword(Vec<PolicyViolation>),

    PasswordReused,

    InvalidOrExpiredResetToken,

    Forbidden,

    NotFound(String),

    ValidationError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmailAlreadyExists => write!(f, "Email is already registered"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::IncorrectPassword => write!(f, "Current password is incorrect"),
            Self::InvalidToken => write!(f, "Invalid or expired token"),
            Self::WeakPassword(_) => write!(f, "Password does not meet the strength policy"),
            Self::PasswordReused => write!(f, "Password was used recently"),
            Self::InvalidOrExpiredResetToken => write!(f, "Invalid or expired reset token"),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Stable error kind string surfaced in the response envelope.
    const fn code(&self) -> &'static str {
        match self {
            Self::EmailAlreadyExists => "email_already_exists",
            Self::InvalidCredentials => "invalid_credentials",
            Self::IncorrectPassword => "incorrect_password",
            Self::InvalidToken => "invalid_token",
            Self::WeakPassword(_) => "weak_password",
            Self::PasswordReused => "password_reused",
            Self::InvalidOrExpiredResetToken => "invalid_or_expired_token",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::EmailAlreadyExists => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::InvalidCredentials | Self::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Self::WeakPassword(violations) => {
                let detail: Vec<&str> = violations
                    .iter()
                    .map(|v| match v {
                        PolicyViolation::TooShort => "too short",
                        PolicyViolation::NoUppercase => "missing an uppercase letter",
                        PolicyViolation::NoLowercase => "missing a lowercase letter",
                        PolicyViolation::NoDigit => "missing a digit",
                        PolicyViolation::NoSymbol => "missing a symbol",
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    format!("Password is not strong enough: {}", detail.join(", ")),
                )
            }
            Self::IncorrectPassword | Self::PasswordReused | Self::InvalidOrExpiredResetToken => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(self.code(), error_message);
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailAlreadyExists => Self::EmailAlreadyExists,
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidToken => Self::InvalidToken,
            AuthError::WeakPassword(violations) => Self::WeakPassword(violations),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::UserNotFound => Self::NotFound("User not found".to_string()),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::IncorrectPassword => Self::IncorrectPassword,
            PasswordError::WeakPassword(violations) => Self::WeakPassword(violations),
            PasswordError::PasswordReused => Self::PasswordReused,
            PasswordError::InvalidOrExpiredToken => Self::InvalidOrExpiredResetToken,
            PasswordError::UserNotFound => Self::NotFound("User not found".to_string()),
            PasswordError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

//! Domain service for registration, login, and token lifecycle.

use thiserror::Error;

use crate::db::User;
use crate::services::password::PolicyViolation;
use crate::services::token::TokenError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email is already registered")]
    EmailAlreadyExists,

    /// Covers wrong password, unknown email, and deactivated accounts; callers
    /// must not be able to tell these apart.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password does not meet the strength policy")]
    WeakPassword(Vec<PolicyViolation>),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(_: TokenError) -> Self {
        Self::InvalidToken
    }
}

/// Input for creating an account.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Successful registration or login: the sanitized user plus a token pair.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub password_change_required: bool,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account and signs the new user in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailAlreadyExists`] on a duplicate email and
    /// [`AuthError::WeakPassword`] when the password fails the policy.
    async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError>;

    /// Verifies credentials and issues a fresh token pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails, without
    /// distinguishing why.
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Exchanges a valid refresh token for a new access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError>;

    /// Verifies an access token and loads its user. The request-auth path.
    async fn authenticate(&self, access_token: &str) -> Result<User, AuthError>;

    /// Loads a user by id.
    async fn get_user(&self, user_id: i32) -> Result<User, AuthError>;
}

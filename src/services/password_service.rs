//! Domain service for the password lifecycle: self-service change, admin
//! overrides, reset tokens, and history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::password::PolicyViolation;

/// Errors specific to password operations.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Password does not meet the strength policy")]
    WeakPassword(Vec<PolicyViolation>),

    #[error("Password was used recently")]
    PasswordReused,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for PasswordError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A password-history row as exposed to admins. Hashes never leave the
/// service layer.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i32,
    pub changed_at: DateTime<Utc>,
}

/// Domain service trait for password management.
#[async_trait::async_trait]
pub trait PasswordService: Send + Sync {
    /// Self-service change: verifies the current password, then enforces the
    /// strength policy and the no-reuse window before persisting.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError::IncorrectPassword`], [`PasswordError::WeakPassword`],
    /// or [`PasswordError::PasswordReused`] in that order of precedence.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), PasswordError>;

    /// Admin override: sets a new password without the current-password check.
    /// The strength policy still applies. When `force_change` is set, the
    /// user's next login reports that a change is required.
    async fn admin_change_password(
        &self,
        target_user_id: i32,
        new_password: &str,
        force_change: bool,
    ) -> Result<(), PasswordError>;

    /// Marks the user so clients prompt for a password change. Advisory: it
    /// never blocks login.
    async fn force_password_change(&self, user_id: i32) -> Result<(), PasswordError>;

    /// Whether the user is currently flagged for a forced change.
    async fn is_change_required(&self, user_id: i32) -> Result<bool, PasswordError>;

    /// Issues a reset token for the account, replacing any live one.
    ///
    /// Returns `Some(token)` when the email matched an account and `None`
    /// otherwise; the HTTP layer responds identically in both cases so the
    /// endpoint cannot be used to enumerate accounts.
    async fn request_reset(&self, email: &str) -> Result<Option<String>, PasswordError>;

    /// Redeems a reset token. Single-use: a successful redemption clears the
    /// stored token, so a second attempt fails.
    async fn redeem_reset(&self, token: &str, new_password: &str) -> Result<(), PasswordError>;

    /// Clears reset tokens past their expiry; returns how many were swept.
    async fn sweep_expired_tokens(&self) -> Result<u64, PasswordError>;

    /// Password-change history for a user, newest first.
    async fn history(&self, user_id: i32) -> Result<Vec<HistoryEntry>, PasswordError>;

    /// A random password satisfying the strength policy.
    fn generate_password(&self, length: usize) -> String;
}

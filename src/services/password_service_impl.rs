//! `SeaORM` implementation of the `PasswordService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::db::Store;
use crate::services::password::{PasswordHasher, PasswordPolicy, generate_secure_password};
use crate::services::password_service::{HistoryEntry, PasswordError, PasswordService};

const RESET_TOKEN_BYTES: usize = 32;

/// Reset tokens are high-entropy random strings, so a lower bcrypt cost than
/// for user passwords keeps redemption scans affordable.
const RESET_TOKEN_COST: u32 = 10;

pub struct SeaOrmPasswordService {
    store: Store,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    history_depth: u64,
    reset_token_ttl: Duration,
}

impl SeaOrmPasswordService {
    #[must_use]
    pub const fn new(
        store: Store,
        hasher: PasswordHasher,
        policy: PasswordPolicy,
        history_depth: u64,
        reset_token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            policy,
            history_depth,
            reset_token_ttl,
        }
    }

    fn check_policy(&self, password: &str) -> Result<(), PasswordError> {
        let violations = self.policy.validate(password);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PasswordError::WeakPassword(violations))
        }
    }

    /// Rejects the candidate if it matches any hash in the recent history
    /// window. The current password is always in the window since every
    /// accepted password is appended to history on persist.
    async fn check_reuse(&self, user_id: i32, candidate: &str) -> Result<(), PasswordError> {
        let recent = self
            .store
            .recent_password_hashes(user_id, self.history_depth)
            .await?;

        for hash in recent {
            if PasswordHasher::verify_blocking(candidate.to_string(), hash).await? {
                return Err(PasswordError::PasswordReused);
            }
        }

        Ok(())
    }

    /// Hashes and stores the new password. `must_change` is the force-change
    /// flag's final state, written inside the same transaction as the hash.
    async fn persist_new_password(
        &self,
        user_id: i32,
        new_password: &str,
        must_change: bool,
    ) -> Result<(), PasswordError> {
        let hash = self.hasher.hash_blocking(new_password.to_string()).await?;
        self.store
            .update_user_password(user_id, &hash, must_change)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PasswordService for SeaOrmPasswordService {
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), PasswordError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(PasswordError::UserNotFound)?;

        let verified = PasswordHasher::verify_blocking(
            current_password.to_string(),
            user.password_hash,
        )
        .await?;
        if !verified {
            return Err(PasswordError::IncorrectPassword);
        }

        self.check_policy(new_password)?;
        self.check_reuse(user_id, new_password).await?;
        self.persist_new_password(user_id, new_password, false).await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    async fn admin_change_password(
        &self,
        target_user_id: i32,
        new_password: &str,
        force_change: bool,
    ) -> Result<(), PasswordError> {
        self.store
            .get_user_by_id(target_user_id)
            .await?
            .ok_or(PasswordError::UserNotFound)?;

        self.check_policy(new_password)?;
        self.persist_new_password(target_user_id, new_password, force_change)
            .await?;

        info!(user_id = target_user_id, force_change, "Password set by admin");
        Ok(())
    }

    async fn force_password_change(&self, user_id: i32) -> Result<(), PasswordError> {
        self.store
            .get_user_by_id(user_id)
            .await?
            .ok_or(PasswordError::UserNotFound)?;

        self.store.set_must_change_password(user_id, true).await?;
        info!(user_id, "Password change forced");
        Ok(())
    }

    async fn is_change_required(&self, user_id: i32) -> Result<bool, PasswordError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(PasswordError::UserNotFound)?;

        Ok(user.must_change_password)
    }

    async fn request_reset(&self, email: &str) -> Result<Option<String>, PasswordError> {
        let user = self.store.get_user_by_email(email).await?;

        // The token is generated and hashed whether or not the email matched,
        // so both paths cost the same to an outside observer.
        let token_bytes: [u8; RESET_TOKEN_BYTES] = rand::rng().random();
        let token = hex::encode(token_bytes);
        let token_hash = PasswordHasher::new(RESET_TOKEN_COST)
            .hash_blocking(token.clone())
            .await?;

        let Some(user) = user else {
            debug!("Reset requested for unknown email");
            return Ok(None);
        };

        let expires = Utc::now() + self.reset_token_ttl;
        self.store
            .set_reset_token(user.id, &token_hash, expires)
            .await?;

        info!(user_id = user.id, "Reset token issued");
        Ok(Some(token))
    }

    async fn redeem_reset(&self, token: &str, new_password: &str) -> Result<(), PasswordError> {
        // The token is unauthenticated, so match it against every live token
        // hash rather than trusting any caller-supplied identity.
        let candidates = self.store.users_with_live_reset_tokens(Utc::now()).await?;

        let mut matched = None;
        for user in candidates {
            let Some(hash) = user.reset_token_hash.clone() else {
                continue;
            };
            if PasswordHasher::verify_blocking(token.to_string(), hash).await? {
                matched = Some(user);
                break;
            }
        }

        let user = matched.ok_or(PasswordError::InvalidOrExpiredToken)?;

        self.check_policy(new_password)?;
        self.check_reuse(user.id, new_password).await?;

        // Persisting clears the stored token hash, which is what makes the
        // token single-use.
        self.persist_new_password(user.id, new_password, false).await?;

        info!(user_id = user.id, "Password reset redeemed");
        Ok(())
    }

    async fn sweep_expired_tokens(&self) -> Result<u64, PasswordError> {
        let swept = self.store.clear_expired_reset_tokens(Utc::now()).await?;
        if swept > 0 {
            info!(swept, "Expired reset tokens cleared");
        }
        Ok(swept)
    }

    async fn history(&self, user_id: i32) -> Result<Vec<HistoryEntry>, PasswordError> {
        self.store
            .get_user_by_id(user_id)
            .await?
            .ok_or(PasswordError::UserNotFound)?;

        let entries = self.store.password_history(user_id).await?;
        Ok(entries
            .into_iter()
            .map(|e| HistoryEntry {
                id: e.id,
                changed_at: e.changed_at,
            })
            .collect())
    }

    fn generate_password(&self, length: usize) -> String {
        generate_secure_password(length)
    }
}

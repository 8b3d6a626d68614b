use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};

use crate::entities::{client_profiles, password_history, trainer_profiles, users};

/// User data returned to the service layer (without the password hash).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub must_change_password: bool,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            must_change_password: model.must_change_password,
            password_changed_at: model.password_changed_at,
            created_at: model.created_at,
        }
    }
}

/// Input for creating a user; the password is already hashed by the caller.
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: String,
    pub password_hash: String,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates a user plus its empty role-specific profile row and the first
    /// password-history entry, all in one transaction.
    ///
    /// Returns `None` when the email already exists. The application-level
    /// lookup in the service is only a fast path; the unique index hit here
    /// is the authoritative duplicate guard.
    pub async fn create(&self, new: NewUser) -> Result<Option<users::Model>> {
        let now = Utc::now();

        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open transaction for user creation")?;

        let active = users::ActiveModel {
            email: Set(new.email.to_lowercase()),
            name: Set(new.name),
            role: Set(new.role),
            password_hash: Set(new.password_hash.clone()),
            password_changed_at: Set(now),
            must_change_password: Set(false),
            is_active: Set(true),
            reset_token_hash: Set(None),
            reset_token_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = match active.insert(&txn).await {
            Ok(user) => user,
            Err(err) => {
                return if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Ok(None)
                } else {
                    Err(err).context("Failed to insert user")
                };
            }
        };

        match user.role.as_str() {
            "trainer" => {
                trainer_profiles::ActiveModel {
                    user_id: Set(user.id),
                    specialization: Set(String::new()),
                    experience_years: Set(0),
                    hourly_rate: Set(0.0),
                    ..Default::default()
                }
                .insert(&txn)
                .await
                .context("Failed to insert trainer profile")?;
            }
            "client" => {
                client_profiles::ActiveModel {
                    user_id: Set(user.id),
                    fitness_goals: Set(String::new()),
                    medical_conditions: Set(String::new()),
                    ..Default::default()
                }
                .insert(&txn)
                .await
                .context("Failed to insert client profile")?;
            }
            _ => {}
        }

        // Seed the history with the initial hash so the no-reuse window
        // covers every password the account has ever had.
        password_history::ActiveModel {
            user_id: Set(user.id),
            password_hash: Set(new.password_hash),
            changed_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert initial password history entry")?;

        txn.commit()
            .await
            .context("Failed to commit user creation")?;

        Ok(Some(user))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email.to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    /// Persists a new password hash atomically: the user row update (hash,
    /// changed-at stamp, cleared reset-token fields, the force-change flag)
    /// and the history append commit or roll back together. `must_change`
    /// sets the flag's final state in the same transaction so an admin-forced
    /// rotation cannot be lost between writes.
    pub async fn update_password(
        &self,
        user_id: i32,
        new_hash: &str,
        must_change: bool,
    ) -> Result<()> {
        let now = Utc::now();

        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open transaction for password update")?;

        let user = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await
            .context("Failed to query user for password update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash.to_string());
        active.password_changed_at = Set(now);
        active.must_change_password = Set(must_change);
        active.reset_token_hash = Set(None);
        active.reset_token_expires = Set(None);
        active.updated_at = Set(now);
        active
            .update(&txn)
            .await
            .context("Failed to update user password")?;

        password_history::ActiveModel {
            user_id: Set(user_id),
            password_hash: Set(new_hash.to_string()),
            changed_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to append password history entry")?;

        txn.commit()
            .await
            .context("Failed to commit password update")?;

        Ok(())
    }

    pub async fn set_must_change_password(&self, user_id: i32, flag: bool) -> Result<()> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for force-change flag")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.must_change_password = Set(flag);
        active.updated_at = Set(Utc::now());
        active
            .update(&self.conn)
            .await
            .context("Failed to update force-change flag")?;

        Ok(())
    }

    /// Stores the hash of a freshly issued reset token, replacing any live
    /// token the user may already have.
    pub async fn set_reset_token(
        &self,
        user_id: i32,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for reset token")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.reset_token_hash = Set(Some(token_hash.to_string()));
        active.reset_token_expires = Set(Some(expires));
        active.updated_at = Set(Utc::now());
        active
            .update(&self.conn)
            .await
            .context("Failed to store reset token")?;

        Ok(())
    }

    pub async fn with_live_reset_tokens(&self, now: DateTime<Utc>) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .filter(users::Column::ResetTokenHash.is_not_null())
            .filter(users::Column::ResetTokenExpires.gt(now))
            .all(&self.conn)
            .await
            .context("Failed to query users with live reset tokens")
    }

    /// Clears reset-token fields for every user whose token has expired.
    /// Idempotent; safe to race with redemption since both only clear.
    pub async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::ResetTokenHash, sea_orm::sea_query::Expr::value(Option::<String>::None))
            .col_expr(users::Column::ResetTokenExpires, sea_orm::sea_query::Expr::value(Option::<DateTime<Utc>>::None))
            .filter(users::Column::ResetTokenHash.is_not_null())
            .filter(users::Column::ResetTokenExpires.lte(now))
            .exec(&self.conn)
            .await
            .context("Failed to sweep expired reset tokens")?;

        Ok(result.rows_affected)
    }
}

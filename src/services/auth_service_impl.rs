//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::{NewUser, Store, User};
use crate::services::auth_service::{AuthError, AuthSession, AuthService, Registration};
use crate::services::password::{PasswordHasher, PasswordPolicy};
use crate::services::token::{TokenKind, TokenService};

const VALID_ROLES: &[&str] = &["admin", "trainer", "client"];

/// A structurally valid bcrypt hash that matches no password. The login path
/// verifies against it when the email is unknown so a miss costs the same as
/// a wrong password.
const DUMMY_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<TokenService>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: Arc<TokenService>,
        hasher: PasswordHasher,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
            policy,
        }
    }

    fn session_for(&self, user: User) -> Result<AuthSession, AuthError> {
        let access_token = self
            .tokens
            .issue_access_token(user.id, &user.email, &user.role)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let refresh_token = self
            .tokens
            .issue_refresh_token(user.id)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let password_change_required = user.must_change_password;
        Ok(AuthSession {
            user,
            access_token,
            refresh_token,
            password_change_required,
        })
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        if !VALID_ROLES.contains(&registration.role.as_str()) {
            return Err(AuthError::Validation(format!(
                "Unknown role: {}",
                registration.role
            )));
        }

        let violations = self.policy.validate(&registration.password);
        if !violations.is_empty() {
            return Err(AuthError::WeakPassword(violations));
        }

        // Fast path only; the unique index in the store is the real guard
        // against concurrent registration with the same email.
        if self
            .store
            .get_user_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(AuthError::EmailAlreadyExists);
        }

        let hash = self.hasher.hash_blocking(registration.password).await?;

        let created = self
            .store
            .create_user(NewUser {
                name: registration.name,
                email: registration.email,
                role: registration.role,
                password_hash: hash,
            })
            .await?
            .ok_or(AuthError::EmailAlreadyExists)?;

        info!(user_id = created.id, role = %created.role, "User registered");
        self.session_for(created.into())
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self.store.get_user_by_email(email).await?;

        let stored_hash = user
            .as_ref()
            .map_or_else(|| DUMMY_HASH.to_string(), |u| u.password_hash.clone());

        let verified =
            PasswordHasher::verify_blocking(password.to_string(), stored_hash).await?;

        let Some(user) = user else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verified {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = user.id, "Login attempt on deactivated account");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "User logged in");
        self.session_for(user.into())
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let verified = self.tokens.verify(refresh_token, TokenKind::Refresh)?;

        let user = self
            .store
            .get_user_by_id(verified.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            return Err(AuthError::InvalidToken);
        }

        self.tokens
            .issue_access_token(user.id, &user.email, &user.role)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let verified = self.tokens.verify(access_token, TokenKind::Access)?;

        let user = self
            .store
            .get_user_by_id(verified.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::InvalidToken);
        }

        Ok(user.into())
    }

    async fn get_user(&self, user_id: i32) -> Result<User, AuthError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(user.into())
    }
}

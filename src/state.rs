use std::sync::Arc;

use chrono::Duration;

use crate::config::{Config, Secrets};
use crate::db::Store;
use crate::services::auth_service::AuthService;
use crate::services::auth_service_impl::SeaOrmAuthService;
use crate::services::crypto::{CredentialEncryption, is_encrypted};
use crate::services::password::{PasswordHasher, PasswordPolicy};
use crate::services::password_service::PasswordService;
use crate::services::password_service_impl::SeaOrmPasswordService;
use crate::services::token::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub passwords: Arc<dyn PasswordService>,
}

impl AppState {
    pub async fn new(config: Config, secrets: &Secrets) -> anyhow::Result<Self> {
        let crypto = CredentialEncryption::new(&secrets.encryption_key);

        // The database URL may be stored encrypted in the config file.
        let database_url = if is_encrypted(&config.general.database_url) {
            crypto
                .decrypt(&config.general.database_url)
                .map_err(|e| anyhow::anyhow!("Failed to decrypt database URL: {e}"))?
        } else {
            config.general.database_url.clone()
        };

        let store = Store::with_pool_options(
            &database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::with_store(config, secrets, store))
    }

    /// Wires the service graph onto an already-connected store. Tests use
    /// this with an in-memory database.
    #[must_use]
    pub fn with_store(config: Config, secrets: &Secrets, store: Store) -> Self {
        let tokens = Arc::new(TokenService::new(
            &secrets.access_token_secret,
            &secrets.refresh_token_secret,
            Duration::minutes(config.security.access_token_ttl_minutes),
            Duration::days(config.security.refresh_token_ttl_days),
        ));

        let hasher = PasswordHasher::new(config.security.bcrypt_cost);
        let policy = PasswordPolicy::new(config.security.password_min_length);

        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens,
            hasher,
            policy.clone(),
        )) as Arc<dyn AuthService>;

        let passwords = Arc::new(SeaOrmPasswordService::new(
            store.clone(),
            hasher,
            policy,
            config.security.password_history_depth,
            Duration::minutes(config.security.reset_token_ttl_minutes),
        )) as Arc<dyn PasswordService>;

        Self {
            config: Arc::new(config),
            store,
            auth,
            passwords,
        }
    }
}

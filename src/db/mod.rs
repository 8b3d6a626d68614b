use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{password_history, users};

pub mod migrator;
pub mod repositories;

pub use repositories::user::{NewUser, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn password_history_repo(&self) -> repositories::password_history::PasswordHistoryRepository {
        repositories::password_history::PasswordHistoryRepository::new(self.conn.clone())
    }

    pub async fn create_user(&self, new: NewUser) -> Result<Option<users::Model>> {
        self.user_repo().create(new).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        self.user_repo().find_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        self.user_repo().find_by_id(id).await
    }

    pub async fn update_user_password(
        &self,
        user_id: i32,
        new_hash: &str,
        must_change: bool,
    ) -> Result<()> {
        self.user_repo()
            .update_password(user_id, new_hash, must_change)
            .await
    }

    pub async fn set_must_change_password(&self, user_id: i32, flag: bool) -> Result<()> {
        self.user_repo().set_must_change_password(user_id, flag).await
    }

    pub async fn set_reset_token(
        &self,
        user_id: i32,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        self.user_repo()
            .set_reset_token(user_id, token_hash, expires)
            .await
    }

    pub async fn users_with_live_reset_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<users::Model>> {
        self.user_repo().with_live_reset_tokens(now).await
    }

    pub async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        self.user_repo().clear_expired_reset_tokens(now).await
    }

    pub async fn recent_password_hashes(&self, user_id: i32, limit: u64) -> Result<Vec<String>> {
        self.password_history_repo()
            .recent_hashes(user_id, limit)
            .await
    }

    pub async fn password_history(&self, user_id: i32) -> Result<Vec<password_history::Model>> {
        self.password_history_repo().entries(user_id).await
    }
}

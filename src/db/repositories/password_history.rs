use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::entities::password_history;

pub struct PasswordHistoryRepository {
    conn: DatabaseConnection,
}

impl PasswordHistoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// The most recent `limit` hashes, newest first. Only this window is ever
    /// consulted for the reuse check; older rows are retained but ignored.
    pub async fn recent_hashes(&self, user_id: i32, limit: u64) -> Result<Vec<String>> {
        let entries = password_history::Entity::find()
            .filter(password_history::Column::UserId.eq(user_id))
            .order_by_desc(password_history::Column::ChangedAt)
            .order_by_desc(password_history::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query recent password history")?;

        Ok(entries.into_iter().map(|e| e.password_hash).collect())
    }

    /// Full history for a user, newest first. Hashes stay inside the service
    /// boundary; the API layer only exposes ids and timestamps.
    pub async fn entries(&self, user_id: i32) -> Result<Vec<password_history::Model>> {
        password_history::Entity::find()
            .filter(password_history::Column::UserId.eq(user_id))
            .order_by_desc(password_history::Column::ChangedAt)
            .order_by_desc(password_history::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query password history")
    }
}

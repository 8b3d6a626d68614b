use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PasswordHistory)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(TrainerProfiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(ClientProfiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // The "last N hashes" query filters by user and sorts by changed_at.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_password_history_user_changed")
                    .table(PasswordHistory)
                    .col(crate::entities::password_history::Column::UserId)
                    .col(crate::entities::password_history::Column::ChangedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClientProfiles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TrainerProfiles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PasswordHistory).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}

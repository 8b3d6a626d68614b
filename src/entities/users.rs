use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stored lowercased; uniqueness is enforced by the database index.
    #[sea_orm(unique)]
    pub email: String,

    pub name: String,

    /// One of "admin", "trainer", "client".
    pub role: String,

    /// bcrypt password hash
    pub password_hash: String,

    pub password_changed_at: DateTimeUtc,

    /// Forces password rotation on next login (advisory, not login-blocking).
    pub must_change_password: bool,

    pub is_active: bool,

    /// bcrypt hash of the live reset token, if one exists.
    pub reset_token_hash: Option<String>,

    pub reset_token_expires: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::password_history::Entity")]
    PasswordHistory,
}

impl Related<super::password_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

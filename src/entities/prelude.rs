pub use super::client_profiles::Entity as ClientProfiles;
pub use super::password_history::Entity as PasswordHistory;
pub use super::trainer_profiles::Entity as TrainerProfiles;
pub use super::users::Entity as Users;

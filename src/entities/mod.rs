pub mod prelude;

pub mod client_profiles;
pub mod password_history;
pub mod trainer_profiles;
pub mod users;

pub mod password_history;
pub mod user;

pub mod auth_service;
pub mod auth_service_impl;
pub mod crypto;
pub mod password;
pub mod password_service;
pub mod password_service_impl;
pub mod token;

//! Credential handling: access-token signing, password hashing, refresh
//! secrets and the [`service::AuthService`] that orchestrates them.

pub mod jwt;
pub mod password;
pub mod refresh_token;
pub mod service;

//! Admission control: rate limiting, bearer authentication and role gates.

pub mod auth;
pub mod rate_limit;
pub mod rbac;

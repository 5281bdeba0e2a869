//! Domain primitives shared by the persistence and HTTP layers.
//!
//! This crate has no internal dependencies so it can be used from the
//! repository layer, the API server, and any future worker or CLI tooling.

pub mod error;
pub mod roles;
pub mod types;
pub mod validation;

//! Long-running housekeeping tasks spawned by `main`.

pub mod session_cleanup;

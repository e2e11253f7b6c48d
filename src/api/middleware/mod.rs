//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate: per-caller request quota
//! 2. Auth: resolves the bearer token into `CurrentUser`
//! 3. Audit: logs after auth, so it knows the caller

pub mod audit;
pub mod auth;
pub mod rate;

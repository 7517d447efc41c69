//! Middleware and error mapping shared by every route.

pub mod error;
pub mod logging;
pub mod rate_limit;

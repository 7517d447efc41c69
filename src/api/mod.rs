//! HTTP read API over the stored transfers.
//!
//! Routes live in [`server::build_router`]; request parsing in
//! [`extractors`], error mapping in [`middleware::error`].

pub mod docs;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;

//! Shared application state for the read API.

use std::sync::{atomic::AtomicBool, Arc};
use std::time::SystemTime;

use crate::db::repository::Repository;

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository for database access.
    pub repository: Arc<Repository>,
    /// Set while the ingester is streaming live events.
    pub ingester_streaming: Arc<AtomicBool>,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create a new `AppState` with its own (never set) streaming flag.
    pub fn new(repository: Repository) -> Self {
        Self::with_streaming_flag(repository, Arc::new(AtomicBool::new(false)))
    }

    /// Create a new `AppState` sharing the ingester's streaming flag.
    pub fn with_streaming_flag(repository: Repository, ingester_streaming: Arc<AtomicBool>) -> Self {
        Self {
            repository: Arc::new(repository),
            ingester_streaming,
            start_time: SystemTime::now(),
        }
    }
}

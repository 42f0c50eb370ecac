// src/state.rs

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;

/// Process-wide context handed to the listener and cloned into every session.
/// The pool is the only shared mutable resource between sessions.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::jobs::Dispatcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Background job queue
    pub jobs: Dispatcher,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, jobs: Dispatcher) -> Self {
        Self {
            db,
            config: Arc::new(config),
            jobs,
        }
    }
}

//! StudyPlan Server Library
//!
//! REST backend for the study/course-planning application. Exports the core
//! types and the router for integration tests and reuse.

pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

pub use config::Config;
pub use error::{AppError, Result};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: Config,
}

impl AppState {
    /// Create a new AppState with the given pool and configuration
    pub fn new(pool: sqlx::SqlitePool, config: Config) -> Self {
        Self { pool, config }
    }
}

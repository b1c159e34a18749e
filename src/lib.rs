//! Staffdesk - employee records service
//!
//! CRUD over departments and employees, a dashboard, CSV export, and a small
//! background job system with a cron-driven scheduler for periodic reports.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod reports;
pub mod repository;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;

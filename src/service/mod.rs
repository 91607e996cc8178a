//! Service layer for the lobby bot
//!
//! Application state, health probes and background task management.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthProbe, HealthStatus};

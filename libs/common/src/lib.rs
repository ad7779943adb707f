//! Common library for the Warden backend
//!
//! This crate provides shared functionality used by the RBAC library and the
//! API service: database connectivity, database error types, and tracing
//! setup with log scrubbing.

pub mod database;
pub mod error;
pub mod logging;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool, health_check};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}

//! Role-based access control for the Warden backend
//!
//! Users hold roles, roles hold permissions, and individual resources may
//! carry explicit grant/deny overrides for a user or a role. The
//! [`PermissionEvaluator`] turns all of that into yes/no answers, while
//! [`RbacAdmin`] manages the underlying rows through an [`RbacStore`].

pub mod admin;
pub mod error;
pub mod evaluator;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod seed;
pub mod store;

pub use admin::RbacAdmin;
pub use error::{RbacError, RbacResult};
pub use evaluator::PermissionEvaluator;
pub use memory::InMemoryRbacStore;
pub use models::Subject;
pub use postgres::PgRbacStore;
pub use seed::{Seed, SeedReport};
pub use store::RbacStore;

/// Example wiring against PostgreSQL
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use common::database::{DatabaseConfig, init_pool};
/// use rbac::{PermissionEvaluator, PgRbacStore, RbacAdmin, Seed};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
///     let store = Arc::new(PgRbacStore::new(pool));
///     RbacAdmin::new(store.clone()).seed(&Seed::default_blog()).await?;
///     let _evaluator = PermissionEvaluator::new(store);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}

//! Application state shared across handlers

use std::sync::Arc;

use rbac::{PermissionEvaluator, PgRbacStore, RbacAdmin, RbacStore};
use sqlx::PgPool;

use crate::{
    blacklist::TokenBlacklist,
    config::ServerConfig,
    jwt::JwtService,
    rate_limiter::RateLimiter,
    repositories::{BlacklistStore, PgBlacklistStore, PostRepository, UserRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub jwt_service: JwtService,
    pub blacklist: TokenBlacklist,
    pub user_repository: UserRepository,
    pub post_repository: PostRepository,
    pub rbac: RbacAdmin,
    pub evaluator: PermissionEvaluator,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire the state from explicit stores; tests pass in-memory ones.
    pub fn new(
        pool: PgPool,
        config: ServerConfig,
        jwt_service: JwtService,
        rbac_store: Arc<dyn RbacStore>,
        blacklist_store: Arc<dyn BlacklistStore>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limiter());

        Self {
            user_repository: UserRepository::new(pool.clone()),
            post_repository: PostRepository::new(pool.clone()),
            blacklist: TokenBlacklist::new(blacklist_store, jwt_service.clone()),
            rbac: RbacAdmin::new(rbac_store.clone()),
            evaluator: PermissionEvaluator::new(rbac_store),
            config: Arc::new(config),
            db_pool: pool,
            jwt_service,
            rate_limiter,
        }
    }

    /// Every store backed by the same PostgreSQL pool
    pub fn with_postgres(pool: PgPool, config: ServerConfig, jwt_service: JwtService) -> Self {
        let rbac_store: Arc<dyn RbacStore> = Arc::new(PgRbacStore::new(pool.clone()));
        let blacklist_store: Arc<dyn BlacklistStore> =
            Arc::new(PgBlacklistStore::new(pool.clone()));
        Self::new(pool, config, jwt_service, rbac_store, blacklist_store)
    }
}

//! API service routes
//!
//! Everything except the health check lives under `/api/v1`.

use axum::{Router, middleware, routing::get};

use crate::{middleware::request_logging, state::AppState};

pub mod admin;
pub mod auth;
pub mod blog;
pub mod health;
pub mod permissions;
pub mod users;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router(state.clone()))
        .merge(users::router(state.clone()))
        .merge(permissions::router(state.clone()))
        .merge(admin::router(state.clone()))
        .merge(blog::router(state.clone()));

    Router::new()
        .route("/health/", get(health::health_check))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

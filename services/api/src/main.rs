use anyhow::Result;
use clap::Parser;
use tracing::info;

mod blacklist;
mod cli;
mod config;
mod error;
mod jwt;
mod middleware;
mod models;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod scheduler;
mod state;
mod validation;

use common::database::{DatabaseConfig, init_pool};
use tokio::net::TcpListener;

use crate::{
    cli::{Cli, Commands},
    config::ServerConfig,
    jwt::{JwtConfig, JwtService},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    // Initialize logging
    common::logging::init_tracing(&config.log_level)?;

    info!("Starting API service");

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let state = AppState::with_postgres(pool, config, jwt_service);

    match cli.into_command() {
        Commands::Serve => serve(state).await,
        Commands::Seed {
            demo_users,
            password,
        } => cli::seed(&state, demo_users, &password).await,
        Commands::CleanupTokens => cli::cleanup_tokens(&state).await,
    }
}

async fn serve(state: AppState) -> Result<()> {
    let _cleanup = scheduler::start_token_cleanup(
        state.blacklist.clone(),
        &state.config.cleanup_schedule,
    )
    .await?;

    let address = state.config.bind_address();
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

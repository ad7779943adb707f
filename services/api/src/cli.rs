//! Command line interface

use anyhow::Result;
use clap::{Parser, Subcommand};
use rbac::Seed;
use rbac::seed::{ADMIN_ROLE, DEFAULT_USER_ROLE, MODERATOR_ROLE};
use tracing::info;

use crate::{password::hash_password, repositories::user::UserRecord, state::AppState};

#[derive(Debug, Parser)]
#[command(name = "api")]
#[command(about = "Accounts, RBAC and blog API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Create the default roles and blog permissions
    Seed {
        /// Also create admin@test.com, moderator@test.com and user@test.com
        #[arg(long)]
        demo_users: bool,

        /// Password for the demo users
        #[arg(long, env = "SEED_PASSWORD", default_value = "test123456")]
        password: String,
    },

    /// Remove expired entries from the token blacklist once
    CleanupTokens,
}

impl Cli {
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Serve)
    }
}

/// (email, first name, role)
const DEMO_USERS: [(&str, &str, &str); 3] = [
    ("admin@test.com", "Admin", ADMIN_ROLE),
    ("moderator@test.com", "Moderator", MODERATOR_ROLE),
    ("user@test.com", "Regular", DEFAULT_USER_ROLE),
];

pub async fn seed(state: &AppState, demo_users: bool, password: &str) -> Result<()> {
    let report = state.rbac.seed(&Seed::default_blog()).await?;
    info!(
        "Seed applied: {} roles, {} permissions, {} grants created",
        report.roles_created, report.permissions_created, report.grants_created
    );

    if !demo_users {
        return Ok(());
    }

    let password_hash = hash_password(password)?;
    for (email, first_name, role) in DEMO_USERS {
        let user = match state.user_repository.find_by_email(email).await? {
            Some(user) => {
                info!("Demo user {} already exists", email);
                user
            }
            None => {
                let record = UserRecord {
                    email,
                    password_hash: &password_hash,
                    first_name,
                    last_name: "User",
                    middle_name: None,
                };
                let user = state
                    .user_repository
                    .create_with_default_role(&record, &state.config.default_role)
                    .await?;
                info!("Created demo user {}", email);
                user
            }
        };

        if let Some((_, true)) = state.rbac.assign_role_by_name(user.id, role, None).await? {
            info!("Assigned role {} to {}", role, email);
        }
    }

    Ok(())
}

pub async fn cleanup_tokens(state: &AppState) -> Result<()> {
    let removed = state.blacklist.cleanup_expired().await?;
    info!("Removed {} expired blacklist entries", removed);
    Ok(())
}

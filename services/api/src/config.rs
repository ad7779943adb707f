//! Server configuration
//!
//! Values come from `APP_*` environment variables layered over defaults,
//! e.g. `APP_PORT=8080`, `APP_CLEANUP_SCHEDULE="0 */30 * * * *"`.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::rate_limiter::RateLimiterConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Default tracing directive when `RUST_LOG` is unset
    pub log_level: String,
    /// Role attached to every newly registered user
    pub default_role: String,
    /// Six-field cron expression for the expired token cleanup job
    pub cleanup_schedule: String,
    pub login_max_failures: u32,
    pub login_window_seconds: u64,
    pub login_ban_seconds: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("default_role", rbac::seed::DEFAULT_USER_ROLE)?
            .set_default("cleanup_schedule", "0 0 * * * *")?
            .set_default("login_max_failures", 5)?
            .set_default("login_window_seconds", 300)?
            .set_default("login_ban_seconds", 900)?
            .add_source(Environment::with_prefix("APP").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rate_limiter(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_attempts: self.login_max_failures,
            window_seconds: self.login_window_seconds,
            ban_duration_seconds: self.login_ban_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        unsafe {
            env::remove_var("APP_PORT");
            env::remove_var("APP_DEFAULT_ROLE");
            env::remove_var("APP_LOGIN_MAX_FAILURES");
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.default_role, "user");
        assert_eq!(config.cleanup_schedule, "0 0 * * * *");
        assert_eq!(config.rate_limiter().max_attempts, 5);
        assert_eq!(config.rate_limiter().ban_duration_seconds, 900);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            env::set_var("APP_PORT", "8081");
            env::set_var("APP_DEFAULT_ROLE", "reader");
            env::set_var("APP_LOGIN_MAX_FAILURES", "3");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.default_role, "reader");
        assert_eq!(config.login_max_failures, 3);

        clear_env();
    }
}

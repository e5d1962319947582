//! Service configuration
//!
//! Values come from built-in defaults, an optional `config/admin.{toml,yaml}`
//! file and `ADMIN_` prefixed environment variables, in that order. Nested
//! keys use `__`, e.g. `ADMIN_SECURITY__TOKEN__ACCESS_SECRET`.

use std::time::Duration;

use anyhow::{Result, bail};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::rate_limiter::LoginLimitConfig;
use crate::validation::PasswordStrength;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub token: TokenConfig,
    pub login: LoginConfig,
    pub password: PasswordConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

/// Backing store for login attempt counters
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStoreKind {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginConfig {
    pub max_attempts: i32,
    pub lock_secs: u64,
    pub store: AttemptStoreKind,
    /// How often the in-memory store drops expired counters
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordConfig {
    pub min_strength: PasswordStrength,
}

impl AppConfig {
    /// Load from `config/admin` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config/admin")
    }

    pub fn load_from(file: &str) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000_i64)?
            .set_default("server.shutdown_timeout_secs", 10_i64)?
            .set_default("security.token.issuer", "rbac-admin")?
            .set_default("security.token.access_secret", "")?
            .set_default("security.token.refresh_secret", "")?
            .set_default("security.token.access_ttl_secs", 15 * 60_i64)?
            .set_default("security.token.refresh_ttl_secs", 7 * 24 * 3600_i64)?
            .set_default("security.login.max_attempts", 5_i64)?
            .set_default("security.login.lock_secs", 30 * 60_i64)?
            .set_default("security.login.store", "memory")?
            .set_default("security.login.sweep_interval_secs", 60_i64)?
            .set_default("security.password.min_strength", "medium")?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("ADMIN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let token = &self.security.token;
        if token.access_secret.is_empty() || token.refresh_secret.is_empty() {
            bail!("access and refresh token secrets must be configured");
        }
        if token.access_secret == token.refresh_secret {
            bail!("access and refresh token secrets must differ");
        }
        if token.access_ttl_secs == 0 || token.refresh_ttl_secs == 0 {
            bail!("token lifetimes must be positive");
        }
        if self.security.login.max_attempts <= 0 {
            bail!("security.login.max_attempts must be positive");
        }
        if self.security.login.lock_secs == 0 {
            bail!("security.login.lock_secs must be positive");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl LoginConfig {
    pub fn limit(&self) -> LoginLimitConfig {
        LoginLimitConfig {
            max_attempts: self.max_attempts,
            lock_duration: Duration::from_secs(self.lock_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use portal_auth::AuthConfig;
use portal_db::DbConfig;

/// Process configuration loaded from `PORTAL_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
    /// How often expired sessions are swept.
    pub session_sweep_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables, reading `.env`
    /// first when present (development).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Unset keys
    /// fall back to defaults; set keys must parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_defaults = DbConfig::default();
        let auth_defaults = AuthConfig::default();

        let db = DbConfig {
            url: lookup("PORTAL_DB_URL").unwrap_or(db_defaults.url),
            namespace: lookup("PORTAL_DB_NAMESPACE").unwrap_or(db_defaults.namespace),
            database: lookup("PORTAL_DB_DATABASE").unwrap_or(db_defaults.database),
            username: lookup("PORTAL_DB_USERNAME").unwrap_or(db_defaults.username),
            password: lookup("PORTAL_DB_PASSWORD").unwrap_or(db_defaults.password),
        };

        let auth = AuthConfig {
            argon2_memory_kib: parsed(
                &lookup,
                "PORTAL_ARGON2_MEMORY_KIB",
                auth_defaults.argon2_memory_kib,
            )?,
            argon2_iterations: parsed(
                &lookup,
                "PORTAL_ARGON2_ITERATIONS",
                auth_defaults.argon2_iterations,
            )?,
            argon2_parallelism: parsed(
                &lookup,
                "PORTAL_ARGON2_PARALLELISM",
                auth_defaults.argon2_parallelism,
            )?,
            pepper: lookup("PORTAL_PASSWORD_PEPPER").filter(|p| !p.is_empty()),
            min_password_length: parsed(
                &lookup,
                "PORTAL_MIN_PASSWORD_LENGTH",
                auth_defaults.min_password_length,
            )?,
            max_password_bytes: parsed(
                &lookup,
                "PORTAL_MAX_PASSWORD_BYTES",
                auth_defaults.max_password_bytes,
            )?,
            session_lifetime_secs: parsed(
                &lookup,
                "PORTAL_SESSION_LIFETIME_SECS",
                auth_defaults.session_lifetime_secs,
            )?,
        };

        let sweep_secs: u64 = parsed(&lookup, "PORTAL_SESSION_SWEEP_SECS", 300)?;
        anyhow::ensure!(sweep_secs > 0, "PORTAL_SESSION_SWEEP_SECS must be positive");

        Ok(Self {
            db,
            auth,
            session_sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}

//! PORTal Server: process entry point.
//!
//! Loads configuration, connects to SurrealDB, applies migrations and
//! sweeps expired sessions until interrupted.

mod config;

use anyhow::Context;
use portal_auth::AuthService;
use portal_db::DbManager;
use portal_db::repository::{SurrealMemberRepository, SurrealSessionRepository};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    info!("Starting PORTal server...");

    let config = ServerConfig::from_env()?;
    let manager = DbManager::connect(&config.db)
        .await
        .context("failed to connect to SurrealDB")?;
    let db = manager.client().clone();

    portal_db::run_migrations(&db)
        .await
        .context("failed to apply migrations")?;

    let auth = AuthService::new(
        SurrealMemberRepository::new(db.clone()),
        SurrealSessionRepository::new(db),
        config.auth,
    );

    let mut sweep = tokio::time::interval(config.session_sweep_interval);
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if let Err(e) = auth.purge_expired_sessions().await {
                    error!(error = %e, "Session sweep failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("PORTal server stopped.");
    Ok(())
}

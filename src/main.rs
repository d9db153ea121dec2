//! Shuttle Planner - worker that plans employee shuttle routes
//!
//! This worker connects to NATS and answers the planner frontend.

mod auth;
mod cli;
mod config;
mod defaults;
mod db;
mod handlers;
mod services;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use cli::{Cli, Command};

/// Logs directory - LOGS_DIR when set, else ../logs
fn logs_dir(from_env: Option<String>) -> String {
    from_env
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| "../logs".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tokens go to stdout untouched, before any logging is set up
    if let Some(Command::IssueToken { user, org, role, permissions }) = &cli.command {
        dotenvy::dotenv().ok();
        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let permissions = if permissions.is_empty() {
            vec![auth::PERM_ALL.to_string()]
        } else {
            permissions.clone()
        };
        println!("{}", auth::generate_token(*user, *org, role, &permissions, &secret)?);
        return Ok(());
    }

    let logs_dir = logs_dir(std::env::var("LOGS_DIR").ok());
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,shuttle_planner=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    info!("Starting Shuttle Planner...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;
    info!("Database migrations complete");

    if matches!(cli.command, Some(Command::Migrate)) {
        return Ok(());
    }

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, pool, config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_dir_defaults_to_parent() {
        assert_eq!(logs_dir(None), "../logs");
        assert_eq!(logs_dir(Some(String::new())), "../logs");
        assert_eq!(logs_dir(Some("/var/log/shuttle".into())), "/var/log/shuttle");
    }
}

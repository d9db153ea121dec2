//! Database module

pub mod queries;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")
}

/// Apply embedded migrations.
///
/// The migration history is reconciled first: records of versions no
/// longer shipped are dropped and stored checksums are refreshed, so line
/// ending changes in migration files do not block startup.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    if history_exists(pool).await? {
        reconcile_history(pool, &MIGRATOR).await?;
    }

    MIGRATOR.run(pool).await.context("Failed to run migrations")?;

    info!("Database migrations complete");
    Ok(())
}

async fn history_exists(pool: &PgPool) -> Result<bool> {
    let exists = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn reconcile_history(pool: &PgPool, migrator: &Migrator) -> Result<()> {
    let applied: Vec<(i64, Vec<u8>)> =
        sqlx::query_as("SELECT version, checksum FROM _sqlx_migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    for (version, stored_checksum) in applied {
        let shipped = migrator
            .iter()
            .find(|m| m.version == version && !m.migration_type.is_down_migration());

        match shipped {
            None => {
                warn!("Dropping history of migration {} (no longer shipped)", version);
                sqlx::query("DELETE FROM _sqlx_migrations WHERE version = $1")
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
            Some(migration) if stored_checksum.as_slice() != &*migration.checksum => {
                warn!(
                    "Refreshing checksum of migration {} ({})",
                    migration.version, migration.description
                );
                sqlx::query("UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2")
                    .bind(&*migration.checksum)
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
            Some(_) => {}
        }
    }

    Ok(())
}

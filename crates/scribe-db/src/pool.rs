//! Connection pools and schema setup for the scribe database.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Schema for `users` and `generated_content`, compiled in from
/// `crates/scribe-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Connections per server process. Each request holds at most one, plus one
/// for the quota transaction.
const SERVER_MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// sqlx's own bookkeeping table, left out of [`table_counts`].
const MIGRATIONS_TABLE: &str = "_sqlx_migrations";

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Pool for the API server and operator commands.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(&config.database_url, SERVER_MAX_CONNECTIONS).await
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to apply scribe schema migrations")?;
    info!(migrations = MIGRATOR.iter().count(), "schema up to date");
    Ok(())
}

/// Names usable unquoted in `CREATE DATABASE`.
fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("database URL has no database name")?;
    if !is_plain_identifier(db_name) {
        bail!("database name {db_name:?} may only contain ASCII letters, digits and underscores");
    }

    let admin = connect(&config.maintenance_url(), 1).await?;
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin)
            .await
            .context("failed to look up database in pg_database")?;

    if !exists {
        admin
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
    }
    info!(db = db_name, created = !exists, "database ready");

    admin.close().await;
    Ok(())
}

/// Round-trip a trivial query; backs `GET /health`.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .context("database ping failed")?;
    Ok(())
}

/// Row counts for scribe's tables, alphabetically. Printed by `scribe db-init`.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' AND tablename <> $1 \
         ORDER BY tablename",
    )
    .bind(MIGRATIONS_TABLE)
    .fetch_all(pool)
    .await
    .context("failed to list scribe tables")?;

    let mut counts = Vec::with_capacity(tables.len());
    for table in tables {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table, count));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers() {
        assert!(is_plain_identifier("scribe"));
        assert!(is_plain_identifier("scribe_test_0f3a"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("scribe-prod"));
        assert!(!is_plain_identifier("x; DROP TABLE users"));
    }
}

//! Connection pools and schema bootstrap for the projection store.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/lseq-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// The four projection tables, in dependency order.
pub const PROJECTION_TABLES: [&str; 4] = [
    "learning_contexts",
    "learning_sequences",
    "course_sections",
    "course_section_sequences",
];

const POOL_SIZE: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Open a pool on the configured database.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(&config.database_url, POOL_SIZE).await
}

/// Apply every pending embedded migration.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!("migrations applied");
    Ok(())
}

/// `CREATE DATABASE` takes no bind parameters, so the name is restricted to
/// characters that need no quoting.
fn checked_database_name(config: &DbConfig) -> Result<&str> {
    let name = config
        .database_name()
        .context("could not determine database name from URL")?;
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("database name {name:?} contains invalid characters");
    }
    Ok(name)
}

async fn create_if_missing(maintenance: &PgPool, name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(maintenance)
            .await
            .context("failed to query pg_database")?;
    if exists {
        info!(db = name, "database already exists");
        return Ok(false);
    }
    maintenance
        .execute(format!("CREATE DATABASE {name}").as_str())
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    info!(db = name, "database created");
    Ok(true)
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists. Returns whether it was created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let name = checked_database_name(config)?;
    let maintenance = connect(&config.maintenance_url(), 1).await?;
    let result = create_if_missing(&maintenance, name).await;
    maintenance.close().await;
    result
}

/// Make the configured database ready for use: create it if missing, open a
/// pool, and migrate it.
pub async fn bootstrap(config: &DbConfig) -> Result<PgPool> {
    ensure_database_exists(config).await?;
    let pool = create_pool(config).await?;
    if let Err(err) = run_migrations(&pool).await {
        pool.close().await;
        return Err(err);
    }
    Ok(pool)
}

/// Row count of each projection table, in [`PROJECTION_TABLES`] order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let query = PROJECTION_TABLES
        .iter()
        .enumerate()
        .map(|(pos, table)| format!("SELECT {pos} AS pos, '{table}'::text AS name, COUNT(*) FROM {table}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
        + " ORDER BY pos";

    let rows: Vec<(i32, String, i64)> = sqlx::query_as(&query)
        .fetch_all(pool)
        .await
        .context("failed to count projection rows")?;
    Ok(rows.into_iter().map(|(_, name, count)| (name, count)).collect())
}

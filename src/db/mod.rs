//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for reference data and recorded drops.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Create tables if they don't exist
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS towns (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            county TEXT,
            allows_roadside INTEGER NOT NULL DEFAULT 1,
            bounds_west REAL NOT NULL,
            bounds_south REAL NOT NULL,
            bounds_east REAL NOT NULL,
            bounds_north REAL NOT NULL,
            position INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            id TEXT PRIMARY KEY,
            town_id TEXT NOT NULL,
            name TEXT NOT NULL,
            address TEXT,
            notes TEXT,
            position INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drops (
            id TEXT PRIMARY KEY,
            active INTEGER NOT NULL DEFAULT 1,
            team_id TEXT,
            collection_site_id TEXT,
            latitude REAL,
            longitude REAL,
            created TEXT NOT NULL,
            was_collected INTEGER NOT NULL DEFAULT 0,
            tags TEXT,
            created_by_user_id TEXT NOT NULL,
            created_by_email TEXT NOT NULL,
            bag_count INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_towns_position ON towns(position);
        CREATE INDEX IF NOT EXISTS idx_sites_town_id ON sites(town_id);
        CREATE INDEX IF NOT EXISTS idx_sites_position ON sites(position);
        CREATE INDEX IF NOT EXISTS idx_drops_active ON drops(active);
        CREATE INDEX IF NOT EXISTS idx_drops_created ON drops(created);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

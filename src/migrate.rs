//! Catalog table definitions.
//!
//! Tables carry composite primary keys and no foreign keys. Booleans are
//! stored as SQLite integers (`0`/`1`).

use anyhow::Result;
use sqlx::{Sqlite, SqliteConnection};

use crate::config::Config;
use crate::db;

pub use event_catalog_core::store::MANAGED_TABLES;

/// Tables created by earlier catalog versions; dropped alongside the
/// managed tables.
pub const LEGACY_TABLES: [&str; 2] = ["service_docs", "domain_docs"];

const CREATE_TABLES: [&str; 11] = [
    r#"
    CREATE TABLE IF NOT EXISTS events (
        name TEXT NOT NULL,
        version TEXT NOT NULL,
        is_latest BOOLEAN NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        schema TEXT,
        domain_name TEXT NOT NULL,
        PRIMARY KEY (name, version, is_latest)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS services (
        name TEXT PRIMARY KEY,
        summary TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        domain_name TEXT NOT NULL,
        openapi TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS domains (
        name TEXT PRIMARY KEY,
        summary TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS owners (
        email TEXT PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL DEFAULT '',
        image TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_owners (
        service_name TEXT NOT NULL,
        owner_email TEXT NOT NULL,
        PRIMARY KEY (service_name, owner_email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS domain_owners (
        domain_name TEXT NOT NULL,
        owner_email TEXT NOT NULL,
        PRIMARY KEY (domain_name, owner_email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_owners (
        event_name TEXT NOT NULL,
        event_version TEXT NOT NULL,
        event_is_latest BOOLEAN NOT NULL,
        owner_email TEXT NOT NULL,
        PRIMARY KEY (event_name, event_version, event_is_latest, owner_email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_events (
        service_name TEXT NOT NULL,
        event_name TEXT NOT NULL,
        event_version TEXT NOT NULL,
        event_is_latest BOOLEAN NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('producer', 'consumer')),
        PRIMARY KEY (service_name, event_name, event_version, event_is_latest, role)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_examples (
        event_name TEXT NOT NULL,
        event_version TEXT NOT NULL,
        example_name TEXT NOT NULL,
        example_language TEXT,
        example_content TEXT,
        PRIMARY KEY (event_name, event_version, example_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS docs (
        path TEXT PRIMARY KEY,
        id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        summary TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        domain_name TEXT NOT NULL,
        service_name TEXT NOT NULL DEFAULT '',
        file_name TEXT NOT NULL,
        last_updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doc_owners (
        doc_path TEXT NOT NULL,
        owner_email TEXT NOT NULL,
        PRIMARY KEY (doc_path, owner_email)
    )
    "#,
];

/// Whether `table` exists in the connected database.
pub async fn table_exists<'c, E>(executor: E, table: &str) -> Result<bool>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?",
    )
    .bind(table)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

/// Create every managed table. Idempotent.
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<()> {
    for ddl in CREATE_TABLES {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Delete all rows from every managed table, keeping the tables.
///
/// Expects the full schema; run [`create_schema`] first when it may be
/// incomplete.
pub async fn truncate_all(conn: &mut SqliteConnection) -> Result<()> {
    for table in MANAGED_TABLES {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Drop every managed and legacy table. Idempotent.
pub async fn drop_schema(conn: &mut SqliteConnection) -> Result<()> {
    for table in MANAGED_TABLES.iter().chain(LEGACY_TABLES.iter()) {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// CLI entry point for `catalog init`: create the database and an empty schema.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let mut conn = pool.acquire().await?;
    create_schema(&mut conn).await?;
    drop(conn);
    pool.close().await;
    Ok(())
}

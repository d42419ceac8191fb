//! Storage abstraction for the event catalog.
//!
//! The [`CatalogStore`] trait is the seam between the pure build pipeline
//! and the relational destination. A build hands over a complete
//! [`CatalogSnapshot`]; the store either creates the schema or clears the
//! existing tables, then loads every row.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::CatalogSnapshot;

/// Every table the catalog manages, in creation order.
pub const MANAGED_TABLES: [&str; 11] = [
    "events",
    "services",
    "domains",
    "owners",
    "service_owners",
    "domain_owners",
    "event_owners",
    "service_events",
    "event_examples",
    "docs",
    "doc_owners",
];

/// What [`CatalogStore::persist`] had to do before loading rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaAction {
    /// No schema existed; all tables were created.
    Created,
    /// The schema existed; every managed table was emptied.
    Truncated,
}

/// Row count of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Abstract destination for catalog builds.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`has_schema`](CatalogStore::has_schema) | Whether the `events` table exists |
/// | [`persist`](CatalogStore::persist) | Create or truncate, then bulk insert |
/// | [`drop_all`](CatalogStore::drop_all) | Drop every table, legacy ones included |
/// | [`table_counts`](CatalogStore::table_counts) | Row count per managed table |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn has_schema(&self) -> Result<bool>;

    /// Replace the stored catalog with `snapshot`.
    ///
    /// Either the whole snapshot lands or the previous contents remain.
    async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<SchemaAction>;

    /// Drop every table. Idempotent.
    async fn drop_all(&self) -> Result<()>;

    /// Row counts for the managed tables; empty when no schema exists.
    async fn table_counts(&self) -> Result<Vec<TableCount>>;
}

//! SQLite-backed [`CatalogStore`] implementation.
//!
//! A persist runs as one transaction: create the schema (first build) or
//! empty every managed table (rebuild), then bulk insert each collection
//! with batched multi-row `INSERT` statements. A failure anywhere rolls the
//! database back to its previous contents.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use event_catalog_core::models::CatalogSnapshot;
use event_catalog_core::store::{CatalogStore, SchemaAction, TableCount, MANAGED_TABLES};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Rows per `INSERT` statement. Keeps the widest table under SQLite's
/// historical limit of 999 bound parameters.
const INSERT_BATCH_ROWS: usize = 100;

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database configured in `[db] path`.
    pub async fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    /// A store over a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(db::connect_in_memory().await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn insert_batched<T>(
    conn: &mut SqliteConnection,
    head: &'static str,
    rows: &[&T],
    mut bind: impl FnMut(Separated<'_, 'static, Sqlite, &'static str>, &T),
) -> Result<()> {
    for batch in rows.chunks(INSERT_BATCH_ROWS) {
        let mut qb: QueryBuilder<'static, Sqlite> = QueryBuilder::new(head);
        qb.push_values(batch.iter(), |b, row| bind(b, *row));
        qb.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_snapshot(conn: &mut SqliteConnection, snapshot: &CatalogSnapshot) -> Result<()> {
    let events: Vec<_> = snapshot.events.values().collect();
    insert_batched(
        conn,
        "INSERT INTO events (name, version, is_latest, summary, content, schema, domain_name) ",
        &events,
        |mut b, e| {
            b.push_bind(e.name.clone())
                .push_bind(e.version.clone())
                .push_bind(e.is_latest)
                .push_bind(e.summary.clone())
                .push_bind(e.content.clone())
                .push_bind(e.schema.clone())
                .push_bind(e.domain_name.clone());
        },
    )
    .await?;

    let services: Vec<_> = snapshot.services.values().collect();
    insert_batched(
        conn,
        "INSERT INTO services (name, summary, content, domain_name, openapi) ",
        &services,
        |mut b, s| {
            b.push_bind(s.name.clone())
                .push_bind(s.summary.clone())
                .push_bind(s.content.clone())
                .push_bind(s.domain_name.clone())
                .push_bind(s.openapi.clone());
        },
    )
    .await?;

    let domains: Vec<_> = snapshot.domains.values().collect();
    insert_batched(
        conn,
        "INSERT INTO domains (name, summary, content) ",
        &domains,
        |mut b, d| {
            b.push_bind(d.name.clone())
                .push_bind(d.summary.clone())
                .push_bind(d.content.clone());
        },
    )
    .await?;

    let owners: Vec<_> = snapshot.owners.values().collect();
    insert_batched(
        conn,
        "INSERT INTO owners (email, name, role, image, content) ",
        &owners,
        |mut b, o| {
            b.push_bind(o.email.clone())
                .push_bind(o.name.clone())
                .push_bind(o.role.clone())
                .push_bind(o.image.clone())
                .push_bind(o.content.clone());
        },
    )
    .await?;

    let service_owners: Vec<_> = snapshot.service_owners.values().collect();
    insert_batched(
        conn,
        "INSERT INTO service_owners (service_name, owner_email) ",
        &service_owners,
        |mut b, r| {
            b.push_bind(r.service_name.clone())
                .push_bind(r.owner_email.clone());
        },
    )
    .await?;

    let domain_owners: Vec<_> = snapshot.domain_owners.values().collect();
    insert_batched(
        conn,
        "INSERT INTO domain_owners (domain_name, owner_email) ",
        &domain_owners,
        |mut b, r| {
            b.push_bind(r.domain_name.clone())
                .push_bind(r.owner_email.clone());
        },
    )
    .await?;

    let event_owners: Vec<_> = snapshot.event_owners.values().collect();
    insert_batched(
        conn,
        "INSERT INTO event_owners (event_name, event_version, event_is_latest, owner_email) ",
        &event_owners,
        |mut b, r| {
            b.push_bind(r.event_name.clone())
                .push_bind(r.event_version.clone())
                .push_bind(r.event_is_latest)
                .push_bind(r.owner_email.clone());
        },
    )
    .await?;

    let service_events: Vec<_> = snapshot.service_events.values().collect();
    insert_batched(
        conn,
        "INSERT INTO service_events (service_name, event_name, event_version, event_is_latest, role) ",
        &service_events,
        |mut b, r| {
            b.push_bind(r.service_name.clone())
                .push_bind(r.event_name.clone())
                .push_bind(r.event_version.clone())
                .push_bind(r.event_is_latest)
                .push_bind(r.role.as_str());
        },
    )
    .await?;

    let docs: Vec<_> = snapshot.docs.values().collect();
    insert_batched(
        conn,
        "INSERT INTO docs (path, id, title, summary, content, domain_name, service_name, file_name, last_updated_at) ",
        &docs,
        |mut b, d| {
            b.push_bind(d.path.clone())
                .push_bind(d.id.clone())
                .push_bind(d.title.clone())
                .push_bind(d.summary.clone())
                .push_bind(d.content.clone())
                .push_bind(d.domain_name.clone())
                .push_bind(d.service_name.clone())
                .push_bind(d.file_name.clone())
                .push_bind(d.last_updated_at.clone());
        },
    )
    .await?;

    let doc_owners: Vec<_> = snapshot.doc_owners.values().collect();
    insert_batched(
        conn,
        "INSERT INTO doc_owners (doc_path, owner_email) ",
        &doc_owners,
        |mut b, r| {
            b.push_bind(r.doc_path.clone())
                .push_bind(r.owner_email.clone());
        },
    )
    .await?;

    Ok(())
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn has_schema(&self) -> Result<bool> {
        migrate::table_exists(&self.pool, "events").await
    }

    async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<SchemaAction> {
        let mut tx = self.pool.begin().await?;

        let action = if migrate::table_exists(&mut *tx, "events").await? {
            migrate::create_schema(&mut tx).await?;
            migrate::truncate_all(&mut tx).await?;
            SchemaAction::Truncated
        } else {
            migrate::create_schema(&mut tx).await?;
            SchemaAction::Created
        };

        insert_snapshot(&mut tx, snapshot).await?;
        tx.commit().await?;
        Ok(action)
    }

    async fn drop_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        migrate::drop_schema(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn table_counts(&self) -> Result<Vec<TableCount>> {
        let mut counts = Vec::new();
        for table in MANAGED_TABLES {
            if !migrate::table_exists(&self.pool, table).await? {
                continue;
            }
            let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            counts.push(TableCount {
                table: table.to_string(),
                rows,
            });
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_catalog_core::models::{Event, Role, ServiceEvent, UNSPECIFIED_DOMAIN};
    use sqlx::Row;

    fn snapshot_with_event(summary: &str) -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::new();
        snapshot.events.insert(
            "OrderPlaced-undefined-true".into(),
            Event {
                name: "OrderPlaced".into(),
                version: "1.0.0".into(),
                is_latest: true,
                summary: summary.into(),
                content: String::new(),
                schema: None,
                domain_name: UNSPECIFIED_DOMAIN.into(),
            },
        );
        snapshot.service_events.insert(
            "OrderPlaced-undefined-true-OrderService-producer".into(),
            ServiceEvent {
                service_name: "OrderService".into(),
                event_name: "OrderPlaced".into(),
                event_version: "1.0.0".into(),
                event_is_latest: true,
                role: Role::Producer,
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn test_persist_creates_then_truncates() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(!store.has_schema().await.unwrap());

        let action = store.persist(&snapshot_with_event("v1")).await.unwrap();
        assert_eq!(action, SchemaAction::Created);
        assert!(store.has_schema().await.unwrap());

        let action = store.persist(&snapshot_with_event("v2")).await.unwrap();
        assert_eq!(action, SchemaAction::Truncated);

        let row = sqlx::query("SELECT summary, is_latest, schema FROM events")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("summary"), "v2");
        assert!(row.get::<bool, _>("is_latest"));
        assert!(row.get::<Option<String>, _>("schema").is_none());

        let role: String = sqlx::query_scalar("SELECT role FROM service_events")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(role, "producer");
    }

    #[tokio::test]
    async fn test_table_counts() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.table_counts().await.unwrap().is_empty());

        store.persist(&snapshot_with_event("x")).await.unwrap();
        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts.len(), MANAGED_TABLES.len());
        let get = |t: &str| counts.iter().find(|c| c.table == t).unwrap().rows;
        assert_eq!(get("events"), 1);
        assert_eq!(get("domains"), 1);
        assert_eq!(get("service_events"), 1);
        assert_eq!(get("event_examples"), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.persist(&snapshot_with_event("kept")).await.unwrap();

        // Two rows with the same primary key under different synthetic keys.
        let mut bad = snapshot_with_event("new");
        let dup = bad.events["OrderPlaced-undefined-true"].clone();
        bad.events.insert("another-key".into(), dup);
        assert!(store.persist(&bad).await.is_err());

        let summary: String = sqlx::query_scalar("SELECT summary FROM events")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(summary, "kept");
    }

    #[tokio::test]
    async fn test_large_batches() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut snapshot = CatalogSnapshot::new();
        for i in 0..(INSERT_BATCH_ROWS * 2 + 7) {
            let name = format!("E{}", i);
            snapshot.events.insert(
                name.clone(),
                Event {
                    name,
                    version: "1".into(),
                    is_latest: true,
                    summary: String::new(),
                    content: String::new(),
                    schema: Some("{}".into()),
                    domain_name: UNSPECIFIED_DOMAIN.into(),
                },
            );
        }
        store.persist(&snapshot).await.unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(n as usize, INSERT_BATCH_ROWS * 2 + 7);
    }

    #[tokio::test]
    async fn test_drop_all_removes_legacy_tables() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.persist(&CatalogSnapshot::new()).await.unwrap();
        sqlx::query("CREATE TABLE service_docs (x TEXT)")
            .execute(store.pool())
            .await
            .unwrap();

        store.drop_all().await.unwrap();
        store.drop_all().await.unwrap();

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type='table'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(remaining, 0);
    }
}

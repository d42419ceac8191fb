//! In-memory [`CatalogStore`] implementation for tests.
//!
//! Keeps the last persisted snapshot behind `std::sync::RwLock`.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::CatalogSnapshot;

use super::{CatalogStore, SchemaAction, TableCount, MANAGED_TABLES};

/// In-memory store for testing.
pub struct InMemoryStore {
    snapshot: RwLock<Option<CatalogSnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    /// A copy of the currently stored snapshot, if any.
    pub fn snapshot(&self) -> Option<CatalogSnapshot> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn has_schema(&self) -> Result<bool> {
        let guard = self.snapshot.read().map_err(|_| anyhow!("lock poisoned"))?;
        Ok(guard.is_some())
    }

    async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<SchemaAction> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| anyhow!("lock poisoned"))?;
        let action = if guard.is_some() {
            SchemaAction::Truncated
        } else {
            SchemaAction::Created
        };
        *guard = Some(snapshot.clone());
        Ok(action)
    }

    async fn drop_all(&self) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| anyhow!("lock poisoned"))?;
        *guard = None;
        Ok(())
    }

    async fn table_counts(&self) -> Result<Vec<TableCount>> {
        let guard = self.snapshot.read().map_err(|_| anyhow!("lock poisoned"))?;
        let Some(snapshot) = guard.as_ref() else {
            return Ok(Vec::new());
        };
        let counts = snapshot.row_counts();
        Ok(MANAGED_TABLES
            .iter()
            .map(|table| TableCount {
                table: table.to_string(),
                rows: counts
                    .iter()
                    .find(|(name, _)| name == table)
                    .map(|(_, n)| *n as i64)
                    .unwrap_or(0),
            })
            .collect())
    }
}

//! Build pipeline orchestration.
//!
//! Coordinates the full build: scan → fingerprint → classify → load →
//! resolve → persist → write fingerprint. Everything up to and including
//! resolution happens in memory; the store is only touched once the
//! complete snapshot exists.

use anyhow::Result;
use serde::Serialize;

use event_catalog_core::classify::{classify, CatalogPath};
use event_catalog_core::resolve::CatalogBuilder;
use event_catalog_core::store::{CatalogStore, SchemaAction};

use crate::catalog_fs::scan_catalog;
use crate::config::{Config, OnLoadError};
use crate::error::BuildError;
use crate::fingerprint::{compute_fingerprint, read_fingerprint, write_fingerprint};
use crate::loader::Loader;
use crate::openapi::OpenApiResolver;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::sqlite_store::SqliteStore;

/// A directory left out of a build under `on_load_error = "skip"`.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDirectory {
    pub dir: String,
    pub reason: String,
}

/// Summary of a completed build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub schema: SchemaAction,
    /// Rows written per table.
    pub rows: Vec<(&'static str, usize)>,
    pub directories_loaded: usize,
    pub fingerprint: String,
    pub skipped: Vec<SkippedDirectory>,
}

impl BuildReport {
    /// Whether some directories were skipped instead of failing the build.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Built(BuildReport),
    /// The fingerprint matched the stored one; the database was left alone.
    Unchanged { fingerprint: String },
}

/// Render an error and its sources as `outer: inner: root`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Build the catalog under `config.catalog.root` into `store`.
pub async fn build_catalog(
    config: &Config,
    store: &dyn CatalogStore,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildOutcome, BuildError> {
    let root = &config.catalog.root;
    if !root.is_dir() {
        return Err(BuildError::MissingRoot(root.clone()));
    }

    progress.report(BuildProgressEvent::Scanning {
        root: root.display().to_string(),
    });
    let scan = scan_catalog(root, &config.catalog.exclude_globs).map_err(BuildError::Scan)?;
    let fingerprint = compute_fingerprint(&scan).map_err(BuildError::Fingerprint)?;

    if config.build.skip_unchanged
        && read_fingerprint(&config.catalog.fingerprint_path).as_deref() == Some(fingerprint.as_str())
        && store.has_schema().await.map_err(BuildError::Persist)?
    {
        tracing::info!(%fingerprint, "catalog unchanged, skipping build");
        return Ok(BuildOutcome::Unchanged { fingerprint });
    }

    let classified: Vec<(String, CatalogPath)> = scan
        .dirs()
        .filter_map(|dir| match classify(dir) {
            Some(path) => Some((dir.to_string(), path)),
            None => {
                tracing::trace!(dir, "not a catalog entity directory");
                None
            }
        })
        .collect();

    let resolver = OpenApiResolver::new(&config.openapi).map_err(BuildError::OpenApiSetup)?;
    let loader = Loader::new(&scan, &resolver);
    let mut builder = CatalogBuilder::new(config.build.duplicates);
    let mut skipped = Vec::new();
    let total = classified.len() as u64;

    for (i, (dir, path)) in classified.iter().enumerate() {
        tracing::debug!(dir = dir.as_str(), kind = %path.kind(), "loading");
        match loader.load(dir, path).await {
            Ok(descriptor) => builder.add(descriptor)?,
            Err(source) => match config.build.on_load_error {
                OnLoadError::Abort => {
                    return Err(BuildError::Load {
                        dir: dir.clone(),
                        source,
                    })
                }
                OnLoadError::Skip => {
                    let reason = error_chain(&source);
                    tracing::warn!(dir = dir.as_str(), error = %reason, "skipping directory");
                    skipped.push(SkippedDirectory {
                        dir: dir.clone(),
                        reason,
                    });
                }
            },
        }
        progress.report(BuildProgressEvent::Loading {
            n: i as u64 + 1,
            total,
        });
    }

    for name in builder.events_without_latest() {
        tracing::warn!(event = name.as_str(), "event has versions but no latest directory");
    }

    let snapshot = builder.finish()?;
    let rows = snapshot.row_counts();
    let total_rows: usize = rows.iter().map(|(_, n)| n).sum();

    progress.report(BuildProgressEvent::Persisting {
        rows: total_rows as u64,
    });
    let schema = store
        .persist(&snapshot)
        .await
        .map_err(BuildError::Persist)?;
    match schema {
        SchemaAction::Created => tracing::info!("created catalog schema"),
        SchemaAction::Truncated => tracing::info!("cleared existing catalog tables"),
    }

    write_fingerprint(&config.catalog.fingerprint_path, &fingerprint)
        .map_err(BuildError::Fingerprint)?;
    tracing::info!(
        %fingerprint,
        path = %config.catalog.fingerprint_path.display(),
        "fingerprint updated"
    );

    Ok(BuildOutcome::Built(BuildReport {
        schema,
        rows,
        directories_loaded: classified.len() - skipped.len(),
        fingerprint,
        skipped,
    }))
}

/// Drop every catalog table, including ones from older schema versions.
pub async fn drop_everything(store: &dyn CatalogStore) -> Result<()> {
    store.drop_all().await?;
    tracing::info!("dropped all catalog tables");
    Ok(())
}

/// CLI entry point for `catalog build`.
pub async fn run_build(
    config: &Config,
    fresh: bool,
    progress: &dyn BuildProgressReporter,
) -> Result<()> {
    let store = SqliteStore::open(config).await?;

    if fresh {
        drop_everything(&store).await?;
    }

    let outcome = build_catalog(config, &store, progress).await;
    store.close().await;

    match outcome? {
        BuildOutcome::Unchanged { fingerprint } => {
            println!("build {}", config.catalog.root.display());
            println!("  unchanged: {}", fingerprint);
        }
        BuildOutcome::Built(report) => {
            println!("build {}", config.catalog.root.display());
            println!("  schema: {}", match report.schema {
                SchemaAction::Created => "created",
                SchemaAction::Truncated => "truncated",
            });
            println!("  directories loaded: {}", report.directories_loaded);
            for (table, n) in &report.rows {
                println!("  {:<15} {}", table, n);
            }
            println!("  fingerprint: {}", report.fingerprint);
            if report.is_partial() {
                println!("  skipped directories: {}", report.skipped.len());
                for skip in &report.skipped {
                    println!("    {}: {}", skip.dir, skip.reason);
                }
            }
        }
    }
    println!("ok");
    Ok(())
}

/// CLI entry point for `catalog drop`.
pub async fn run_drop(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let result = drop_everything(&store).await;
    store.close().await;
    result?;
    println!("drop {}", config.db.path.display());
    println!("ok");
    Ok(())
}

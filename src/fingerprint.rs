//! Catalog content fingerprint.
//!
//! SHA-256 over every scanned file, in sorted catalog-relative path order.
//! Each file contributes its relative path and its contents, both length
//! prefixed, so renames and moves change the fingerprint too.
//!
//! The fingerprint is stored as a JSON string (`"3f1c…"`).

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::catalog_fs::{scan_catalog, CatalogScan};
use crate::config::Config;

pub fn compute_fingerprint(scan: &CatalogScan) -> Result<String> {
    let mut hasher = Sha256::new();
    for file in &scan.files {
        let contents = std::fs::read(&file.path)
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        hasher.update((file.relative.len() as u64).to_le_bytes());
        hasher.update(file.relative.as_bytes());
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Read a stored fingerprint. A missing or unreadable artifact reads as `None`.
pub fn read_fingerprint(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<String>(&text).ok()
}

pub fn write_fingerprint(path: &Path, fingerprint: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string(fingerprint)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write fingerprint: {}", path.display()))?;
    Ok(())
}

/// CLI entry point for `catalog fingerprint`.
pub fn run_fingerprint(config: &Config, write: bool) -> Result<()> {
    let scan = scan_catalog(&config.catalog.root, &config.catalog.exclude_globs)?;
    let current = compute_fingerprint(&scan)?;
    let stored = read_fingerprint(&config.catalog.fingerprint_path);

    println!("fingerprint {}", config.catalog.root.display());
    println!("  files: {}", scan.files.len());
    println!("  current: {}", current);
    println!("  stored:  {}", stored.as_deref().unwrap_or("none"));
    println!(
        "  status:  {}",
        if stored.as_deref() == Some(current.as_str()) {
            "unchanged"
        } else {
            "changed"
        }
    );
    if write {
        write_fingerprint(&config.catalog.fingerprint_path, &current)?;
        println!("  written: {}", config.catalog.fingerprint_path.display());
    }
    println!("ok");
    Ok(())
}

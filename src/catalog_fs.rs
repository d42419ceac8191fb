//! Catalog tree scanning.
//!
//! Walks the catalog root once and records every file with its
//! catalog-relative path (`/`-separated, leading `/`). Only directories
//! that directly contain a file are recorded. Paths matching
//! `catalog.exclude_globs` are left out together with everything below
//! them.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file inside the catalog.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    pub path: PathBuf,
    /// Catalog-relative path, e.g. `/domains/Orders/index.md`.
    pub relative: String,
    /// Catalog-relative path of the containing directory.
    pub dir: String,
}

impl CatalogFile {
    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }
}

/// Result of one walk over the catalog root.
#[derive(Debug, Clone)]
pub struct CatalogScan {
    pub root: PathBuf,
    /// Files sorted by catalog-relative path.
    pub files: Vec<CatalogFile>,
    dirs: BTreeSet<String>,
}

impl CatalogScan {
    /// Every directory that directly holds at least one file, sorted.
    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    /// Files directly inside `dir`, in sorted order.
    pub fn files_in<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a CatalogFile> + 'a {
        self.files.iter().filter(move |f| f.dir == dir)
    }

    /// Absolute filesystem path of a catalog-relative directory.
    pub fn dir_path(&self, dir: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

pub fn scan_catalog(root: &Path, exclude_globs: &[String]) -> Result<CatalogScan> {
    if !root.is_dir() {
        bail!("Catalog root does not exist: {}", root.display());
    }

    let exclude_set = build_globset(exclude_globs)?;
    let excluded = |rel: &str, is_dir: bool| {
        exclude_set.is_match(rel) || (is_dir && exclude_set.is_match(format!("{}/", rel)))
    };

    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let rel = relative_path(root, entry.path());
            !excluded(&rel, entry.file_type().is_dir())
        });

    for entry in walker {
        let entry = entry?;
        let rel = relative_path(root, entry.path());
        if entry.file_type().is_file() {
            let dir = match rel.rfind('/') {
                Some(idx) => format!("/{}", &rel[..idx]),
                None => "/".to_string(),
            };
            files.push(CatalogFile {
                path: entry.path().to_path_buf(),
                relative: format!("/{}", rel),
                dir,
            });
        }
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    let dirs: BTreeSet<String> = files.iter().map(|f| f.dir.clone()).collect();

    Ok(CatalogScan {
        root: root.to_path_buf(),
        files,
        dirs,
    })
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

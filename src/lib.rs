//! # Event Catalog
//!
//! Compiles a directory of markdown + YAML/JSON descriptors (domains,
//! services, events, owners and documentation pages) into a SQLite
//! database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  catalog/   │──▶│  Classify   │──▶│   Resolve   │──▶│  SQLite   │
//! │  tree scan  │   │  + Load     │   │  snapshot   │   │  tables   │
//! └─────────────┘   └─────────────┘   └─────────────┘   └──────────┘
//!        │                                                    │
//!        └──────────────▶ fingerprint (catalogHash.json) ◀────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catalog init                 # create database and tables
//! catalog build                # load ./catalog into the database
//! catalog build --if-changed   # skip when the catalog fingerprint is unchanged
//! catalog stats                # row counts per table
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`catalog_fs`] | Catalog tree scanning |
//! | [`loader`] | `index.md` and sidecar loading |
//! | [`openapi`] | OpenAPI `$ref` dereferencing |
//! | [`structured`] | YAML / JSON sidecar parsing |
//! | [`fingerprint`] | Content fingerprint for change detection |
//! | [`ingest`] | Build orchestration |
//! | [`sqlite_store`] | SQLite catalog store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Table definitions |
//!
//! Path classification, front-matter parsing, markdown rendering and
//! cross-reference resolution live in `event-catalog-core`.

pub mod catalog_fs;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod openapi;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
pub mod structured;

pub use error::BuildError;
pub use ingest::{build_catalog, drop_everything, BuildOutcome, BuildReport};

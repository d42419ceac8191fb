//! Rows of the catalog database and the in-memory snapshot that holds them.
//!
//! Every collection in [`CatalogSnapshot`] is keyed by a synthetic string key.
//! The keys only serve to collapse repeated declarations within one build;
//! they are never persisted.

use md5::{Digest, Md5};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the catch-all domain for entities declared outside any domain.
pub const UNSPECIFIED_DOMAIN: &str = "Unspecified";

/// Summary stored on the implicit [`UNSPECIFIED_DOMAIN`] row.
pub const UNSPECIFIED_SUMMARY: &str =
    "Contains events, services, and documents that does not belong to any domain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    pub name: String,
    pub summary: String,
    pub content: String,
}

impl Domain {
    pub fn unspecified() -> Self {
        Self {
            name: UNSPECIFIED_DOMAIN.to_string(),
            summary: UNSPECIFIED_SUMMARY.to_string(),
            content: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub summary: String,
    pub content: String,
    pub domain_name: String,
    /// Fully dereferenced OpenAPI document, serialized as YAML.
    pub openapi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub name: String,
    pub version: String,
    pub is_latest: bool,
    pub summary: String,
    pub content: String,
    /// JSON Schema, normalized to canonical JSON.
    pub schema: Option<String>,
    pub domain_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub email: String,
    pub name: String,
    pub role: String,
    pub image: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Doc {
    pub path: String,
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub domain_name: String,
    pub service_name: String,
    pub file_name: String,
    /// ISO-8601 UTC modification time of the markdown file.
    pub last_updated_at: String,
}

/// Derive the short, stable identifier of a doc page.
///
/// MD5 of `{domain}-{service}-{file_stem}` (each side trimmed, absent
/// sides spelled `undefined`), truncated to 8 hex characters.
pub fn doc_id(domain: Option<&str>, service: Option<&str>, file_stem: &str) -> String {
    let seed = format!(
        "{}-{}-{}",
        domain.map(str::trim).unwrap_or("undefined"),
        service.map(str::trim).unwrap_or("undefined"),
        file_stem.trim()
    );
    let hex = format!("{:x}", Md5::digest(seed.as_bytes()));
    hex[..8].to_string()
}

/// Role a service plays for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainOwner {
    pub domain_name: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOwner {
    pub service_name: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventOwner {
    pub event_name: String,
    pub event_version: String,
    pub event_is_latest: bool,
    pub owner_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEvent {
    pub service_name: String,
    pub event_name: String,
    pub event_version: String,
    pub event_is_latest: bool,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocOwner {
    pub doc_path: String,
    pub owner_email: String,
}

/// The complete, fully materialized result of one catalog build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSnapshot {
    pub domains: BTreeMap<String, Domain>,
    pub services: BTreeMap<String, Service>,
    pub events: BTreeMap<String, Event>,
    pub owners: BTreeMap<String, Owner>,
    pub docs: BTreeMap<String, Doc>,
    pub domain_owners: BTreeMap<String, DomainOwner>,
    pub service_owners: BTreeMap<String, ServiceOwner>,
    pub event_owners: BTreeMap<String, EventOwner>,
    pub service_events: BTreeMap<String, ServiceEvent>,
    pub doc_owners: BTreeMap<String, DocOwner>,
}

impl CatalogSnapshot {
    /// An empty snapshot holding only the implicit `Unspecified` domain.
    pub fn new() -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(UNSPECIFIED_DOMAIN.to_string(), Domain::unspecified());
        Self {
            domains,
            services: BTreeMap::new(),
            events: BTreeMap::new(),
            owners: BTreeMap::new(),
            docs: BTreeMap::new(),
            domain_owners: BTreeMap::new(),
            service_owners: BTreeMap::new(),
            event_owners: BTreeMap::new(),
            service_events: BTreeMap::new(),
            doc_owners: BTreeMap::new(),
        }
    }

    /// Row counts per table name, in table creation order.
    pub fn row_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("events", self.events.len()),
            ("services", self.services.len()),
            ("domains", self.domains.len()),
            ("owners", self.owners.len()),
            ("service_owners", self.service_owners.len()),
            ("domain_owners", self.domain_owners.len()),
            ("event_owners", self.event_owners.len()),
            ("service_events", self.service_events.len()),
            ("docs", self.docs.len()),
            ("doc_owners", self.doc_owners.len()),
        ]
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

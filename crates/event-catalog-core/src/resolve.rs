//! Cross-reference resolution.
//!
//! Loaded descriptors are merged into a [`CatalogSnapshot`] by
//! [`CatalogBuilder`]. Each descriptor contributes its entity row plus the
//! join rows derived from its `owners`, `producers` and `consumers` lists.
//!
//! Rows are keyed by synthetic composite strings such as
//! `{event}-{folder_version}-{is_latest}-{service}-{role}`. Under
//! [`DuplicatePolicy::LastWriteWins`] a repeated key silently replaces the
//! earlier row; under [`DuplicatePolicy::RejectConflicts`] identical repeats
//! still collapse but a differing row under the same key is an error.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use crate::models::{
    CatalogSnapshot, Doc, DocOwner, Domain, DomainOwner, Event, EventOwner, Owner, Role, Service,
    ServiceEvent, ServiceOwner,
};

/// How repeated synthetic keys within one build are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    LastWriteWins,
    RejectConflicts,
}

#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("conflicting {collection} declarations for key '{key}'")]
    ConflictingDuplicate {
        collection: &'static str,
        key: String,
    },
    #[error("duplicate primary key in table {table}: {key}")]
    DuplicatePrimaryKey { table: &'static str, key: String },
}

#[derive(Debug, Clone)]
pub struct DomainDescriptor {
    pub domain: Domain,
    pub owners: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub service: Service,
    pub owners: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EventDescriptor {
    pub event: Event,
    /// Version segment of the directory path, `None` for the latest directory.
    pub folder_version: Option<String>,
    pub owners: Vec<String>,
    pub producers: Vec<String>,
    pub consumers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OwnerDescriptor {
    pub owner: Owner,
}

#[derive(Debug, Clone)]
pub struct DocDescriptor {
    pub doc: Doc,
    pub owners: Vec<String>,
}

/// Everything loaded from one catalog directory.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Domain(DomainDescriptor),
    Service(ServiceDescriptor),
    Event(EventDescriptor),
    Owner(OwnerDescriptor),
    Docs(Vec<DocDescriptor>),
}

/// Accumulates descriptors into a snapshot.
pub struct CatalogBuilder {
    policy: DuplicatePolicy,
    snapshot: CatalogSnapshot,
}

fn put<T: PartialEq + Debug>(
    policy: DuplicatePolicy,
    collection: &'static str,
    map: &mut BTreeMap<String, T>,
    key: String,
    row: T,
) -> Result<(), ConflictError> {
    if policy == DuplicatePolicy::RejectConflicts {
        if let Some(existing) = map.get(&key) {
            if *existing != row {
                return Err(ConflictError::ConflictingDuplicate { collection, key });
            }
        }
    }
    map.insert(key, row);
    Ok(())
}

fn event_key(name: &str, folder_version: Option<&str>, is_latest: bool) -> String {
    format!(
        "{}-{}-{}",
        name,
        folder_version.unwrap_or("undefined"),
        is_latest
    )
}

impl CatalogBuilder {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            snapshot: CatalogSnapshot::new(),
        }
    }

    pub fn add(&mut self, descriptor: Descriptor) -> Result<(), ConflictError> {
        match descriptor {
            Descriptor::Domain(d) => self.add_domain(d),
            Descriptor::Service(s) => self.add_service(s),
            Descriptor::Event(e) => self.add_event(e),
            Descriptor::Owner(o) => self.add_owner(o),
            Descriptor::Docs(docs) => docs.into_iter().try_for_each(|d| self.add_doc(d)),
        }
    }

    pub fn add_domain(&mut self, descriptor: DomainDescriptor) -> Result<(), ConflictError> {
        let name = descriptor.domain.name.clone();
        for owner in descriptor.owners {
            put(
                self.policy,
                "domain_owners",
                &mut self.snapshot.domain_owners,
                format!("{}-{}", name, owner),
                DomainOwner {
                    domain_name: name.clone(),
                    owner_email: owner,
                },
            )?;
        }
        put(
            self.policy,
            "domains",
            &mut self.snapshot.domains,
            name,
            descriptor.domain,
        )
    }

    pub fn add_service(&mut self, descriptor: ServiceDescriptor) -> Result<(), ConflictError> {
        let name = descriptor.service.name.clone();
        for owner in descriptor.owners {
            put(
                self.policy,
                "service_owners",
                &mut self.snapshot.service_owners,
                format!("{}-{}", name, owner),
                ServiceOwner {
                    service_name: name.clone(),
                    owner_email: owner,
                },
            )?;
        }
        put(
            self.policy,
            "services",
            &mut self.snapshot.services,
            name,
            descriptor.service,
        )
    }

    pub fn add_event(&mut self, descriptor: EventDescriptor) -> Result<(), ConflictError> {
        let event = &descriptor.event;
        let key = event_key(
            &event.name,
            descriptor.folder_version.as_deref(),
            event.is_latest,
        );

        for owner in &descriptor.owners {
            put(
                self.policy,
                "event_owners",
                &mut self.snapshot.event_owners,
                format!("{}-{}", key, owner),
                EventOwner {
                    event_name: event.name.clone(),
                    event_version: event.version.clone(),
                    event_is_latest: event.is_latest,
                    owner_email: owner.clone(),
                },
            )?;
        }

        let roles = descriptor
            .producers
            .iter()
            .map(|s| (s, Role::Producer))
            .chain(descriptor.consumers.iter().map(|s| (s, Role::Consumer)));
        for (service, role) in roles {
            put(
                self.policy,
                "service_events",
                &mut self.snapshot.service_events,
                format!("{}-{}-{}", key, service, role),
                ServiceEvent {
                    service_name: service.clone(),
                    event_name: event.name.clone(),
                    event_version: event.version.clone(),
                    event_is_latest: event.is_latest,
                    role,
                },
            )?;
        }

        put(
            self.policy,
            "events",
            &mut self.snapshot.events,
            key,
            descriptor.event,
        )
    }

    pub fn add_owner(&mut self, descriptor: OwnerDescriptor) -> Result<(), ConflictError> {
        let email = descriptor.owner.email.clone();
        put(
            self.policy,
            "owners",
            &mut self.snapshot.owners,
            email,
            descriptor.owner,
        )
    }

    pub fn add_doc(&mut self, descriptor: DocDescriptor) -> Result<(), ConflictError> {
        let path = descriptor.doc.path.clone();
        for owner in descriptor.owners {
            put(
                self.policy,
                "doc_owners",
                &mut self.snapshot.doc_owners,
                format!("{}-{}", path, owner),
                DocOwner {
                    doc_path: path.clone(),
                    owner_email: owner,
                },
            )?;
        }
        put(
            self.policy,
            "docs",
            &mut self.snapshot.docs,
            path,
            descriptor.doc,
        )
    }

    /// Finish the build, checking that no two rows share a table primary key.
    pub fn finish(self) -> Result<CatalogSnapshot, ConflictError> {
        let s = &self.snapshot;
        unique_keys("events", s.events.values(), |e| {
            format!("({}, {}, {})", e.name, e.version, e.is_latest)
        })?;
        unique_keys("event_owners", s.event_owners.values(), |r| {
            format!(
                "({}, {}, {}, {})",
                r.event_name, r.event_version, r.event_is_latest, r.owner_email
            )
        })?;
        unique_keys("service_events", s.service_events.values(), |r| {
            format!(
                "({}, {}, {}, {}, {})",
                r.service_name, r.event_name, r.event_version, r.event_is_latest, r.role
            )
        })?;
        Ok(self.snapshot)
    }

    /// Names of events that have version rows but no latest row.
    pub fn events_without_latest(&self) -> Vec<String> {
        let mut latest: HashMap<&str, bool> = HashMap::new();
        for event in self.snapshot.events.values() {
            *latest.entry(event.name.as_str()).or_default() |= event.is_latest;
        }
        let mut missing: Vec<String> = latest
            .into_iter()
            .filter(|(_, has_latest)| !has_latest)
            .map(|(name, _)| name.to_string())
            .collect();
        missing.sort();
        missing
    }
}

fn unique_keys<'a, T: 'a>(
    table: &'static str,
    rows: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> String,
) -> Result<(), ConflictError> {
    let mut seen = std::collections::HashSet::new();
    for row in rows {
        let k = key(row);
        if !seen.insert(k.clone()) {
            return Err(ConflictError::DuplicatePrimaryKey { table, key: k });
        }
    }
    Ok(())
}

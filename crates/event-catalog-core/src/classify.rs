//! Catalog path classification.
//!
//! Every directory under the catalog root is identified by its
//! catalog-relative path (always starting with `/`). The shape of that path
//! decides which entity the directory describes:
//!
//! | Pattern | Entity |
//! |---------|--------|
//! | `/domains/{domain}` | Domain |
//! | `/owners/{email}` | Owner |
//! | `/services/{service}` | Service |
//! | `/domains/{domain}/services/{service}` | Service (scoped) |
//! | `/events/{event}` | Event, latest |
//! | `/events/{event}/versions/{version}` | Event, explicit version |
//! | `/domains/{domain}/events/{event}` | Event, latest |
//! | `/domains/{domain}/events/{event}/versions/{version}` | Event, explicit version |
//! | `/services/{service}/docs` | Docs |
//! | `/domains/{domain}/services/{service}/docs` | Docs |
//! | `/domains/{domain}/docs` | Docs |
//!
//! Matching is anchored and captured segments never contain `/`, so the
//! patterns are mutually exclusive. Classification only looks at the path
//! string; it never touches the filesystem.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// One of the recognized catalog directory shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathPattern {
    Domain,
    Owner,
    Service,
    DomainService,
    Event,
    EventVersion,
    DomainEvent,
    DomainEventVersion,
    ServiceDocs,
    DomainServiceDocs,
    DomainDocs,
}

impl PathPattern {
    pub const ALL: [PathPattern; 11] = [
        PathPattern::Domain,
        PathPattern::Owner,
        PathPattern::Service,
        PathPattern::DomainService,
        PathPattern::Event,
        PathPattern::EventVersion,
        PathPattern::DomainEvent,
        PathPattern::DomainEventVersion,
        PathPattern::ServiceDocs,
        PathPattern::DomainServiceDocs,
        PathPattern::DomainDocs,
    ];

    fn source(self) -> &'static str {
        match self {
            PathPattern::Domain => r"^/domains/(?P<domain>[^/]+?)$",
            PathPattern::Owner => r"^/owners/(?P<email>[^/]+?)$",
            PathPattern::Service => r"^/services/(?P<service>[^/]+?)$",
            PathPattern::DomainService => {
                r"^/domains/(?P<domain>[^/]+?)/services/(?P<service>[^/]+?)$"
            }
            PathPattern::Event => r"^/events/(?P<event>[^/]+?)$",
            PathPattern::EventVersion => {
                r"^/events/(?P<event>[^/]+?)/versions/(?P<version>[^/]+?)$"
            }
            PathPattern::DomainEvent => {
                r"^/domains/(?P<domain>[^/]+?)/events/(?P<event>[^/]+?)$"
            }
            PathPattern::DomainEventVersion => {
                r"^/domains/(?P<domain>[^/]+?)/events/(?P<event>[^/]+?)/versions/(?P<version>[^/]+?)$"
            }
            PathPattern::ServiceDocs => r"^/services/(?P<service>[^/]+?)/docs$",
            PathPattern::DomainServiceDocs => {
                r"^/domains/(?P<domain>[^/]+?)/services/(?P<service>[^/]+?)/docs$"
            }
            PathPattern::DomainDocs => r"^/domains/(?P<domain>[^/]+?)/docs$",
        }
    }

    /// Compiled, anchored regex for this pattern.
    pub fn regex(self) -> &'static Regex {
        static COMPILED: Lazy<Vec<Regex>> = Lazy::new(|| {
            PathPattern::ALL
                .iter()
                .map(|p| Regex::new(p.source()).expect("catalog path pattern is valid"))
                .collect()
        });
        &COMPILED[self as usize]
    }

    pub fn matches(self, path: &str) -> bool {
        self.regex().is_match(path)
    }
}

/// The kind of entity a classified directory yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Domain,
    Owner,
    Service,
    Event,
    Docs,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Domain => "domain",
            EntityKind::Owner => "owner",
            EntityKind::Service => "service",
            EntityKind::Event => "event",
            EntityKind::Docs => "docs",
        };
        f.write_str(s)
    }
}

/// A classified catalog directory with its trimmed captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogPath {
    Domain {
        domain: String,
    },
    Owner {
        email: String,
    },
    Service {
        domain: Option<String>,
        service: String,
    },
    Event {
        domain: Option<String>,
        event: String,
        /// `None` for the latest directory, `Some(v)` under `/versions/{v}`.
        version: Option<String>,
    },
    Docs {
        domain: Option<String>,
        service: Option<String>,
    },
}

impl CatalogPath {
    pub fn kind(&self) -> EntityKind {
        match self {
            CatalogPath::Domain { .. } => EntityKind::Domain,
            CatalogPath::Owner { .. } => EntityKind::Owner,
            CatalogPath::Service { .. } => EntityKind::Service,
            CatalogPath::Event { .. } => EntityKind::Event,
            CatalogPath::Docs { .. } => EntityKind::Docs,
        }
    }

    /// Whether an event directory denotes the latest version.
    ///
    /// Only meaningful for [`CatalogPath::Event`]; other kinds return `false`.
    pub fn is_latest(&self) -> bool {
        matches!(self, CatalogPath::Event { version: None, .. })
    }
}

/// Classify a catalog-relative directory path.
///
/// Returns `None` for paths that match no pattern, and for paths whose
/// captured segments are empty after trimming whitespace.
pub fn classify(path: &str) -> Option<CatalogPath> {
    let (pattern, caps) = PathPattern::ALL
        .iter()
        .find_map(|p| p.regex().captures(path).map(|c| (*p, c)))?;

    let get = |name: &str| -> Option<String> {
        caps.name(name)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    };
    // A capture group that exists in the pattern must survive trimming.
    let required = |name: &str| -> Option<Option<String>> {
        if pattern.regex().capture_names().flatten().any(|n| n == name) {
            get(name).map(Some)
        } else {
            Some(None)
        }
    };

    let classified = match pattern {
        PathPattern::Domain => CatalogPath::Domain {
            domain: get("domain")?,
        },
        PathPattern::Owner => CatalogPath::Owner {
            email: get("email")?,
        },
        PathPattern::Service | PathPattern::DomainService => CatalogPath::Service {
            domain: required("domain")?,
            service: get("service")?,
        },
        PathPattern::Event
        | PathPattern::EventVersion
        | PathPattern::DomainEvent
        | PathPattern::DomainEventVersion => CatalogPath::Event {
            domain: required("domain")?,
            event: get("event")?,
            version: required("version")?,
        },
        PathPattern::ServiceDocs | PathPattern::DomainServiceDocs | PathPattern::DomainDocs => {
            CatalogPath::Docs {
                domain: required("domain")?,
                service: required("service")?,
            }
        }
    };

    Some(classified)
}

/// The pattern a path matches, if any.
pub fn matching_pattern(path: &str) -> Option<PathPattern> {
    PathPattern::ALL.iter().copied().find(|p| p.matches(path))
}

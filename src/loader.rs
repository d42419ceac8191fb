//! Descriptor loading.
//!
//! Turns one classified catalog directory into a [`Descriptor`]: parses
//! `index.md`, renders its body, picks up `schema.*` / `openapi.*`
//! sidecars, and for docs directories loads every markdown page.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

use event_catalog_core::classify::CatalogPath;
use event_catalog_core::front_matter::{parse_document, trimmed, FrontMatterError, ParsedDocument};
use event_catalog_core::models::{doc_id, Doc, Domain, Event, Owner, Service, UNSPECIFIED_DOMAIN};
use event_catalog_core::render::render_markdown;
use event_catalog_core::resolve::{
    Descriptor, DocDescriptor, DomainDescriptor, EventDescriptor, OwnerDescriptor,
    ServiceDescriptor,
};

use crate::catalog_fs::{CatalogFile, CatalogScan};
use crate::openapi::{OpenApiError, OpenApiResolver};
use crate::structured::{self, Format, SyntaxError};

const SCHEMA_SIDECARS: [&str; 3] = ["schema.yaml", "schema.yml", "schema.json"];
const OPENAPI_SIDECARS: [&str; 3] = ["openapi.yaml", "openapi.yml", "openapi.json"];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("missing index.md in {0}")]
    MissingIndex(PathBuf),
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
    #[error("invalid schema {path}")]
    Schema {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },
    #[error("invalid OpenAPI document {path}")]
    OpenApi {
        path: PathBuf,
        #[source]
        source: OpenApiError,
    },
}

/// Shared inputs for loading directories during one build.
pub struct Loader<'a> {
    scan: &'a CatalogScan,
    openapi: &'a OpenApiResolver,
}

impl<'a> Loader<'a> {
    pub fn new(scan: &'a CatalogScan, openapi: &'a OpenApiResolver) -> Self {
        Self { scan, openapi }
    }

    /// Load the catalog directory `dir`, classified as `path`.
    pub async fn load(&self, dir: &str, path: &CatalogPath) -> Result<Descriptor, LoadError> {
        match path {
            CatalogPath::Domain { domain } => {
                let doc = self.read_index(dir)?;
                let fm = &doc.front_matter;
                Ok(Descriptor::Domain(DomainDescriptor {
                    owners: fm.owners(),
                    domain: Domain {
                        name: domain.clone(),
                        summary: trimmed(&fm.summary),
                        content: render_markdown(&doc.body, dir),
                    },
                }))
            }
            CatalogPath::Owner { email } => {
                let doc = self.read_index(dir)?;
                let fm = &doc.front_matter;
                Ok(Descriptor::Owner(OwnerDescriptor {
                    owner: Owner {
                        email: email.clone(),
                        name: trimmed(&fm.name),
                        role: trimmed(&fm.role),
                        image: trimmed(&fm.image),
                        content: render_markdown(&doc.body, dir),
                    },
                }))
            }
            CatalogPath::Service { domain, service } => {
                let doc = self.read_index(dir)?;
                let openapi = match self.sidecar(dir, &OPENAPI_SIDECARS) {
                    Some(file) => Some(
                        self.openapi
                            .dereference_to_yaml(&file.path)
                            .await
                            .map_err(|source| LoadError::OpenApi {
                                path: file.path.clone(),
                                source,
                            })?,
                    ),
                    None => None,
                };
                let fm = &doc.front_matter;
                Ok(Descriptor::Service(ServiceDescriptor {
                    owners: fm.owners(),
                    service: Service {
                        name: service.clone(),
                        summary: trimmed(&fm.summary),
                        content: render_markdown(&doc.body, dir),
                        domain_name: domain_or_unspecified(domain),
                        openapi,
                    },
                }))
            }
            CatalogPath::Event {
                domain,
                event,
                version,
            } => {
                let doc = self.read_index(dir)?;
                let schema = match self.sidecar(dir, &SCHEMA_SIDECARS) {
                    Some(file) => Some(read_schema(file)?),
                    None => None,
                };
                let fm = &doc.front_matter;
                Ok(Descriptor::Event(EventDescriptor {
                    event: Event {
                        name: event.clone(),
                        version: trimmed(&fm.version),
                        is_latest: path.is_latest(),
                        summary: trimmed(&fm.summary),
                        content: render_markdown(&doc.body, dir),
                        schema,
                        domain_name: domain_or_unspecified(domain),
                    },
                    folder_version: version.clone(),
                    owners: fm.owners(),
                    producers: fm.producer_names(),
                    consumers: fm.consumer_names(),
                }))
            }
            CatalogPath::Docs { domain, service } => {
                let mut docs = Vec::new();
                for file in self.scan.files_in(dir) {
                    if !file.file_name().ends_with(".md") {
                        continue;
                    }
                    docs.push(load_doc(file, dir, domain, service)?);
                }
                Ok(Descriptor::Docs(docs))
            }
        }
    }

    fn read_index(&self, dir: &str) -> Result<ParsedDocument, LoadError> {
        let file = self
            .scan
            .files_in(dir)
            .find(|f| f.file_name() == "index.md")
            .ok_or_else(|| LoadError::MissingIndex(self.scan.dir_path(dir)))?;
        read_markdown(&file.path)
    }

    /// First file in `dir`, in sorted order, whose lowercased name is one of `names`.
    fn sidecar(&self, dir: &str, names: &[&str]) -> Option<&'a CatalogFile> {
        let scan: &'a CatalogScan = self.scan;
        scan.files.iter().find(|f| {
            f.dir == dir && names.contains(&f.file_name().to_ascii_lowercase().as_str())
        })
    }
}

fn domain_or_unspecified(domain: &Option<String>) -> String {
    domain
        .clone()
        .unwrap_or_else(|| UNSPECIFIED_DOMAIN.to_string())
}

fn read_markdown(path: &Path) -> Result<ParsedDocument, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text).map_err(|source| LoadError::FrontMatter {
        path: path.to_path_buf(),
        source,
    })
}

fn read_schema(file: &CatalogFile) -> Result<String, LoadError> {
    let text = std::fs::read_to_string(&file.path).map_err(|source| LoadError::Read {
        path: file.path.clone(),
        source,
    })?;
    let value = structured::parse(&text, Format::from_name(file.file_name())).map_err(
        |source| LoadError::Schema {
            path: file.path.clone(),
            source,
        },
    )?;
    Ok(structured::canonical_json(&value))
}

fn load_doc(
    file: &CatalogFile,
    dir: &str,
    domain: &Option<String>,
    service: &Option<String>,
) -> Result<DocDescriptor, LoadError> {
    let doc = read_markdown(&file.path)?;
    let fm = &doc.front_matter;

    let name = file.file_name();
    let stem = &name[..name.len() - ".md".len()];
    let domain_name = domain_or_unspecified(domain);

    let title = match trimmed(&fm.title) {
        t if t.is_empty() => stem.to_string(),
        t => t,
    };

    let modified = std::fs::metadata(&file.path)
        .and_then(|m| m.modified())
        .map_err(|source| LoadError::Read {
            path: file.path.clone(),
            source,
        })?;
    let last_updated_at =
        DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Millis, true);

    Ok(DocDescriptor {
        owners: fm.owners(),
        doc: Doc {
            path: file.relative.clone(),
            id: doc_id(Some(&domain_name), service.as_deref(), stem),
            title,
            summary: trimmed(&fm.summary),
            content: render_markdown(&doc.body, dir),
            domain_name,
            service_name: service.clone().unwrap_or_default(),
            file_name: stem.to_string(),
            last_updated_at,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_fs::scan_catalog;
    use crate::config::OpenApiConfig;
    use event_catalog_core::classify::classify;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    async fn load(root: &Path, dir: &str) -> Result<Descriptor, LoadError> {
        let scan = scan_catalog(root, &[]).unwrap();
        let resolver = OpenApiResolver::new(&OpenApiConfig {
            remote_refs: false,
            timeout_secs: 5,
        })
        .unwrap();
        let loader = Loader::new(&scan, &resolver);
        let path = classify(dir).unwrap();
        let result = loader.load(dir, &path).await;
        result
    }

    #[tokio::test]
    async fn test_event_with_schema() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "domains/Orders/events/OrderPlaced/index.md",
            "---\nversion: 1.0.0\nsummary: ' Placed '\nproducers:\n  - OrderService\nconsumers:\n  - name: Billing\n---\n# Order placed\n",
        );
        write(
            tmp.path(),
            "domains/Orders/events/OrderPlaced/Schema.YML",
            "type: object\nproperties:\n  id: {type: string}\n",
        );

        let Descriptor::Event(e) = load(tmp.path(), "/domains/Orders/events/OrderPlaced")
            .await
            .unwrap()
        else {
            panic!("expected event");
        };
        assert_eq!(e.event.name, "OrderPlaced");
        assert_eq!(e.event.version, "1.0.0");
        assert!(e.event.is_latest);
        assert_eq!(e.event.summary, "Placed");
        assert_eq!(e.event.domain_name, "Orders");
        assert_eq!(e.event.content, "<h1>Order placed</h1>");
        assert_eq!(
            e.event.schema.as_deref(),
            Some(r#"{"properties":{"id":{"type":"string"}},"type":"object"}"#)
        );
        assert_eq!(e.folder_version, None);
        assert_eq!(e.producers, vec!["OrderService"]);
        assert_eq!(e.consumers, vec!["Billing"]);
    }

    #[tokio::test]
    async fn test_missing_index_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("domains/Orders")).unwrap();
        let err = load(tmp.path(), "/domains/Orders").await.unwrap_err();
        assert!(matches!(err, LoadError::MissingIndex(_)));
    }

    #[tokio::test]
    async fn test_malformed_schema_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "events/E/index.md", "---\nversion: 1\n---\n");
        write(tmp.path(), "events/E/schema.json", "{ not json");
        let err = load(tmp.path(), "/events/E").await.unwrap_err();
        assert!(matches!(err, LoadError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_service_defaults_to_unspecified_domain() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "services/Billing/index.md", "Billing service");
        let Descriptor::Service(s) = load(tmp.path(), "/services/Billing").await.unwrap() else {
            panic!("expected service");
        };
        assert_eq!(s.service.domain_name, UNSPECIFIED_DOMAIN);
        assert_eq!(s.service.summary, "");
        assert!(s.service.openapi.is_none());
        assert!(s.owners.is_empty());
    }

    #[tokio::test]
    async fn test_owner_fields() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "owners/jane@example.com/index.md",
            "---\nname: Jane\nrole: Lead\nimage: jane.png\n---\nHi",
        );
        let Descriptor::Owner(o) = load(tmp.path(), "/owners/jane@example.com").await.unwrap()
        else {
            panic!("expected owner");
        };
        assert_eq!(o.owner.email, "jane@example.com");
        assert_eq!(o.owner.name, "Jane");
        assert_eq!(o.owner.role, "Lead");
        assert_eq!(o.owner.image, "jane.png");
        assert_eq!(o.owner.content, "<p>Hi</p>");
    }

    #[tokio::test]
    async fn test_docs_directory() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "domains/Orders/docs/getting-started.md",
            "---\ntitle: Getting Started\nowners: [a@x.io]\n---\nSee ![flow](flow.png)\n",
        );
        write(tmp.path(), "domains/Orders/docs/faq.md", "Questions");
        write(tmp.path(), "domains/Orders/docs/flow.png", "png");
        write(tmp.path(), "domains/Orders/docs/DRAFT.MD", "not a doc");

        let Descriptor::Docs(docs) = load(tmp.path(), "/domains/Orders/docs").await.unwrap()
        else {
            panic!("expected docs");
        };
        assert_eq!(docs.len(), 2);

        let faq = &docs[0].doc;
        assert_eq!(faq.path, "/domains/Orders/docs/faq.md");
        assert_eq!(faq.title, "faq");
        assert_eq!(faq.file_name, "faq");
        assert_eq!(faq.service_name, "");
        assert_eq!(faq.id, doc_id(Some("Orders"), None, "faq"));
        assert!(faq.last_updated_at.ends_with('Z'));
        assert_eq!(faq.last_updated_at.len(), "2024-01-01T00:00:00.000Z".len());

        let guide = &docs[1];
        assert_eq!(guide.doc.title, "Getting Started");
        assert_eq!(guide.owners, vec!["a@x.io"]);
        assert!(guide
            .doc
            .content
            .contains("src=\"/catalog/domains/Orders/docs/flow.png\""));
    }
}

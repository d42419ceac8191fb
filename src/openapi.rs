//! OpenAPI `$ref` dereferencing.
//!
//! A service's `openapi.{yaml,yml,json}` is loaded, every document it
//! references is fetched up front, and then all `$ref` objects are replaced
//! with their targets. Supported references:
//!
//! - internal JSON pointers (`#/components/schemas/Order`)
//! - relative or `file://` references to other documents, with an optional
//!   pointer fragment
//! - `http://` / `https://` references, when `openapi.remote_refs` is on
//!
//! A reference that leads back into a target still being expanded is left
//! as a `{"$ref": ...}` node, so recursive schemas serialize as a finite
//! tree.

use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::OpenApiConfig;
use crate::structured::{self, Format, SyntaxError};

#[derive(Debug, thiserror::Error)]
pub enum OpenApiError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {location}")]
    Parse {
        location: String,
        #[source]
        source: SyntaxError,
    },
    #[error("invalid $ref '{reference}' in {base}")]
    InvalidRef { reference: String, base: String },
    #[error("unsupported $ref scheme in '{0}'")]
    UnsupportedScheme(String),
    #[error("remote $ref '{0}' is not allowed (openapi.remote_refs = false)")]
    RemoteDisabled(String),
    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("$ref target not found: {0}")]
    NotFound(String),
    #[error("failed to serialize dereferenced document")]
    Serialize(#[source] serde_yaml::Error),
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Resolves OpenAPI documents. One instance is shared by a whole build.
pub struct OpenApiResolver {
    client: Option<reqwest::Client>,
}

impl OpenApiResolver {
    pub fn new(config: &OpenApiConfig) -> Result<Self, OpenApiError> {
        let client = if config.remote_refs {
            Some(
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()
                    .map_err(OpenApiError::Client)?,
            )
        } else {
            None
        };
        Ok(Self { client })
    }

    /// Load `path`, dereference it fully and serialize the result as YAML.
    pub async fn dereference_to_yaml(&self, path: &Path) -> Result<String, OpenApiError> {
        let value = self.dereference_file(path).await?;
        serde_yaml::to_string(&value).map_err(OpenApiError::Serialize)
    }

    /// Load `path` and return it with every `$ref` replaced by its target.
    pub async fn dereference_file(&self, path: &Path) -> Result<Value, OpenApiError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| OpenApiError::Read {
                    path: path.to_path_buf(),
                    source,
                })?
                .join(path)
        };
        let root_url = Url::from_file_path(&absolute).map_err(|_| OpenApiError::InvalidRef {
            reference: absolute.display().to_string(),
            base: absolute.display().to_string(),
        })?;

        let documents = self.load_documents(root_url.clone()).await?;
        let root = documents
            .get(&root_url)
            .ok_or_else(|| OpenApiError::NotFound(root_url.to_string()))?;

        let mut stack = Vec::new();
        dereference(root, &root_url, &documents, &mut stack)
    }

    /// Fetch the root document and, transitively, every document it refers to.
    async fn load_documents(&self, root: Url) -> Result<HashMap<Url, Value>, OpenApiError> {
        let mut documents = HashMap::new();
        let mut pending = vec![root];

        while let Some(url) = pending.pop() {
            if documents.contains_key(&url) {
                continue;
            }
            let value = self.fetch(&url).await?;
            let mut refs = Vec::new();
            collect_refs(&value, &mut refs);
            for reference in refs {
                let (target, _) = split_ref(&url, &reference)?;
                if !documents.contains_key(&target) && target != url {
                    pending.push(target);
                }
            }
            documents.insert(url, value);
        }

        Ok(documents)
    }

    async fn fetch(&self, url: &Url) -> Result<Value, OpenApiError> {
        let format = Format::from_name(url.path());
        let text = match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| OpenApiError::UnsupportedScheme(url.to_string()))?;
                std::fs::read_to_string(&path)
                    .map_err(|source| OpenApiError::Read { path, source })?
            }
            "http" | "https" => {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| OpenApiError::RemoteDisabled(url.to_string()))?;
                tracing::debug!(url = %url, "fetching remote OpenAPI document");
                let fetch_err = |source| OpenApiError::Fetch {
                    url: url.to_string(),
                    source,
                };
                client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(fetch_err)?
                    .text()
                    .await
                    .map_err(fetch_err)?
            }
            _ => return Err(OpenApiError::UnsupportedScheme(url.to_string())),
        };
        structured::parse(&text, format).map_err(|source| OpenApiError::Parse {
            location: url.to_string(),
            source,
        })
    }
}

fn ref_of(map: &Map<String, Value>) -> Option<&str> {
    map.get("$ref").and_then(Value::as_str)
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(r) = ref_of(map) {
                out.push(r.to_string());
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}

/// Split a `$ref` into the absolute document URL and the decoded JSON pointer.
fn split_ref(base: &Url, reference: &str) -> Result<(Url, String), OpenApiError> {
    let (doc, fragment) = match reference.split_once('#') {
        Some((doc, fragment)) => (doc, fragment),
        None => (reference, ""),
    };
    let mut url = if doc.is_empty() {
        base.clone()
    } else {
        base.join(doc).map_err(|_| OpenApiError::InvalidRef {
            reference: reference.to_string(),
            base: base.to_string(),
        })?
    };
    url.set_fragment(None);
    let pointer = percent_decode_str(fragment).decode_utf8_lossy().into_owned();
    Ok((url, pointer))
}

fn dereference(
    value: &Value,
    doc_url: &Url,
    documents: &HashMap<Url, Value>,
    stack: &mut Vec<String>,
) -> Result<Value, OpenApiError> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = ref_of(map) {
                let (target_url, pointer) = split_ref(doc_url, reference)?;
                let key = format!("{}#{}", target_url, pointer);
                if stack.contains(&key) {
                    tracing::debug!(reference = %key, "keeping circular $ref");
                    return Ok(value.clone());
                }
                let target = documents
                    .get(&target_url)
                    .and_then(|doc| doc.pointer(&pointer))
                    .ok_or_else(|| OpenApiError::NotFound(key.clone()))?;

                stack.push(key);
                let resolved = dereference(target, &target_url, documents, stack)?;
                stack.pop();

                // Keys next to `$ref` extend the resolved object.
                let siblings: Vec<_> = map.iter().filter(|(k, _)| *k != "$ref").collect();
                return match resolved {
                    Value::Object(mut merged) if !siblings.is_empty() => {
                        for (k, v) in siblings {
                            merged.insert(k.clone(), dereference(v, doc_url, documents, stack)?);
                        }
                        Ok(Value::Object(merged))
                    }
                    other => Ok(other),
                };
            }
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), dereference(v, doc_url, documents, stack)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| dereference(v, doc_url, documents, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

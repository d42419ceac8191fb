//! Front-matter parsing for catalog markdown files.
//!
//! A catalog markdown file optionally starts with a YAML block fenced by
//! `---` lines. Everything after the closing fence is the markdown body.
//! Front-matter is lenient: unknown keys are ignored, missing keys default
//! to empty, and scalar values of any type are accepted where a string is
//! expected.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;

/// Error raised when a front-matter block is not valid YAML.
#[derive(Debug, thiserror::Error)]
#[error("invalid front-matter: {0}")]
pub struct FrontMatterError(#[from] serde_yaml::Error);

/// A scalar YAML value accepted in place of a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => f.write_str(&number_to_string(*x)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Format a float the way YAML authors expect to read it back: `1.0` is `1`.
pub fn number_to_string(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_string()
    } else if x.is_infinite() {
        let sign = if x > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if x.fract() == 0.0 && x.abs() < 1e21 {
        format!("{}", x as i128)
    } else {
        format!("{}", x)
    }
}

/// A producer or consumer reference as written in event front-matter.
///
/// Authors may write either `- OrderService` or `- name: OrderService`.
/// Both resolve to the same service name through [`ServiceRef::name`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServiceRef {
    PlainName(String),
    DetailedRef {
        #[serde(default)]
        name: Option<Scalar>,
        #[serde(flatten)]
        extra: BTreeMap<String, serde_yaml::Value>,
    },
    Unrecognized(serde_yaml::Value),
}

impl ServiceRef {
    /// The trimmed service name, or `None` when the entry carries no usable name.
    pub fn name(&self) -> Option<String> {
        let raw = match self {
            ServiceRef::PlainName(s) => s.clone(),
            ServiceRef::DetailedRef {
                name: Some(name), ..
            } => name.to_string(),
            ServiceRef::DetailedRef { name: None, .. } | ServiceRef::Unrecognized(_) => {
                return None
            }
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| scalar_text(&v)))
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value = Option::<OneOrMany<T>>::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(u)) => u.to_string(),
            _ => number_to_string(n.as_f64().unwrap_or(f64::NAN)),
        }),
        serde_yaml::Value::Tagged(tagged) => scalar_text(&tagged.value),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
    }
}

/// Parsed front-matter fields used by the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    owners: Vec<serde_yaml::Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub producers: Vec<ServiceRef>,
    #[serde(deserialize_with = "lenient_list")]
    pub consumers: Vec<ServiceRef>,
}

impl FrontMatter {
    /// Trimmed owner emails; non-scalar and blank entries are dropped.
    pub fn owners(&self) -> Vec<String> {
        self.owners
            .iter()
            .filter_map(scalar_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Resolved producer service names.
    pub fn producer_names(&self) -> Vec<String> {
        self.producers.iter().filter_map(ServiceRef::name).collect()
    }

    /// Resolved consumer service names.
    pub fn consumer_names(&self) -> Vec<String> {
        self.consumers.iter().filter_map(ServiceRef::name).collect()
    }
}

/// Trim an optional string, mapping `None` to the empty string.
pub fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// A markdown document split into front-matter and body.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub front_matter: FrontMatter,
    pub body: String,
}

/// Split `input` into its raw YAML block and the remaining body.
///
/// Returns `None` for the YAML part when the file does not open with a
/// `---` fence or the fence is never closed.
pub fn split_front_matter(input: &str) -> (Option<&str>, &str) {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let Some(first_break) = input.find('\n') else {
        return (None, input);
    };
    if input[..first_break].trim_end() != "---" {
        return (None, input);
    }

    let yaml_start = first_break + 1;
    let mut offset = yaml_start;
    for line in input[yaml_start..].split_inclusive('\n') {
        let bare = line.trim_end_matches(['\r', '\n']);
        if bare == "---" {
            let yaml = &input[yaml_start..offset];
            let body = &input[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, input)
}

/// Parse a catalog markdown file.
pub fn parse_document(input: &str) -> Result<ParsedDocument, FrontMatterError> {
    let (yaml, body) = split_front_matter(input);
    let front_matter = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => {
            let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
            match value {
                serde_yaml::Value::Null => FrontMatter::default(),
                serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)?,
                _ => {
                    return Err(FrontMatterError(serde::de::Error::custom(
                        "front-matter must be a mapping",
                    )))
                }
            }
        }
        _ => FrontMatter::default(),
    };
    Ok(ParsedDocument {
        front_matter,
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_front_matter() {
        let (yaml, body) = split_front_matter("---\nsummary: hi\n---\n# Body\n");
        assert_eq!(yaml, Some("summary: hi\n"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_no_front_matter() {
        let doc = parse_document("# Just markdown\n").unwrap();
        assert!(doc.front_matter.summary.is_none());
        assert_eq!(doc.body, "# Just markdown\n");
    }

    #[test]
    fn test_unclosed_fence_is_body() {
        let (yaml, body) = split_front_matter("---\nsummary: hi\n");
        assert!(yaml.is_none());
        assert_eq!(body, "---\nsummary: hi\n");
    }

    #[test]
    fn test_crlf_and_empty_block() {
        let doc = parse_document("---\r\nsummary: hi\r\n---\r\nbody").unwrap();
        assert_eq!(doc.front_matter.summary.as_deref(), Some("hi"));
        assert_eq!(doc.body, "body");

        let empty = parse_document("---\n---\nbody").unwrap();
        assert!(empty.front_matter.owners().is_empty());
        assert_eq!(empty.body, "body");
    }

    #[test]
    fn test_event_fields() {
        let doc = parse_document(
            "---\nversion: 1.0\nsummary: '  Placed  '\nowners:\n  - a@x.io\n  - ' b@x.io '\nproducers:\n  - OrderService\nconsumers:\n  - name: Shipping\n    reason: ships\n---\n",
        )
        .unwrap();
        let fm = doc.front_matter;
        assert_eq!(fm.version.as_deref(), Some("1"));
        assert_eq!(trimmed(&fm.summary), "Placed");
        assert_eq!(fm.owners(), vec!["a@x.io", "b@x.io"]);
        assert_eq!(fm.producer_names(), vec!["OrderService"]);
        assert_eq!(fm.consumer_names(), vec!["Shipping"]);
    }

    #[test]
    fn test_plain_and_detailed_refs_resolve_identically() {
        let plain = parse_document("---\nproducers: [\"svc-a\"]\n---\n").unwrap();
        let detailed = parse_document("---\nproducers:\n  - name: svc-a\n---\n").unwrap();
        assert_eq!(
            plain.front_matter.producer_names(),
            detailed.front_matter.producer_names()
        );
    }

    #[test]
    fn test_unusable_refs_are_ignored() {
        let doc = parse_document("---\nproducers:\n  - 42\n  - ~\n  - other: x\n  - '  '\n---\n")
            .unwrap();
        assert!(doc.front_matter.producer_names().is_empty());
    }

    #[test]
    fn test_null_and_single_value_lists() {
        let doc = parse_document("---\nowners: ~\nconsumers: Billing\n---\n").unwrap();
        assert!(doc.front_matter.owners().is_empty());
        assert_eq!(doc.front_matter.consumer_names(), vec!["Billing"]);
    }

    #[test]
    fn test_version_scalars() {
        let doc = parse_document("---\nversion: 2\n---\n").unwrap();
        assert_eq!(doc.front_matter.version.as_deref(), Some("2"));
        let doc = parse_document("---\nversion: 1.5\n---\n").unwrap();
        assert_eq!(doc.front_matter.version.as_deref(), Some("1.5"));
        let doc = parse_document("---\nversion: '0.0.1'\n---\n").unwrap();
        assert_eq!(doc.front_matter.version.as_deref(), Some("0.0.1"));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(parse_document("---\nsummary: [unclosed\n---\n").is_err());
        assert!(parse_document("---\n- a\n- b\n---\n").is_err());
    }
}

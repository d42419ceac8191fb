use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub use event_catalog_core::resolve::DuplicatePolicy;

/// Environment variable that overrides `[db] path`.
pub const DB_PATH_ENV: &str = "DB_PATH";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub openapi: OpenApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/catalog.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_fingerprint_path")]
    pub fingerprint_path: PathBuf,
    /// Glob patterns, relative to `root`, for files and directories to ignore.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            fingerprint_path: default_fingerprint_path(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./catalog")
}
fn default_fingerprint_path() -> PathBuf {
    PathBuf::from("./catalogHash.json")
}

/// What a build does when one directory fails to load.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnLoadError {
    /// Fail the whole build before touching the database.
    #[default]
    Abort,
    /// Log, record the directory as skipped, and keep going.
    Skip,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BuildConfig {
    #[serde(default)]
    pub on_load_error: OnLoadError,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Skip the database load when the catalog fingerprint is unchanged.
    #[serde(default)]
    pub skip_unchanged: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenApiConfig {
    /// Resolve `$ref`s that point at `http://` or `https://` URLs.
    #[serde(default = "default_remote_refs")]
    pub remote_refs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            remote_refs: default_remote_refs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_remote_refs() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_db_path_override(&mut config, std::env::var(DB_PATH_ENV).ok());
    validate(&config)?;
    Ok(config)
}

/// Replace `[db] path` with a non-blank override value.
pub fn apply_db_path_override(config: &mut Config, value: Option<String>) {
    if let Some(path) = value.filter(|v| !v.trim().is_empty()) {
        config.db.path = PathBuf::from(path);
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }
    if config.catalog.root.as_os_str().is_empty() {
        anyhow::bail!("catalog.root must not be empty");
    }
    if config.catalog.fingerprint_path.as_os_str().is_empty() {
        anyhow::bail!("catalog.fingerprint_path must not be empty");
    }
    if config.openapi.timeout_secs == 0 {
        anyhow::bail!("openapi.timeout_secs must be > 0");
    }
    for pattern in &config.catalog.exclude_globs {
        globset::Glob::new(pattern)
            .with_context(|| format!("Invalid catalog.exclude_globs pattern: '{}'", pattern))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config = parse("").unwrap();
        assert_eq!(config.db.path, PathBuf::from("./data/catalog.sqlite"));
        assert_eq!(config.catalog.root, PathBuf::from("./catalog"));
        assert_eq!(
            config.catalog.fingerprint_path,
            PathBuf::from("./catalogHash.json")
        );
        assert_eq!(config.build.on_load_error, OnLoadError::Abort);
        assert_eq!(config.build.duplicates, DuplicatePolicy::LastWriteWins);
        assert!(!config.build.skip_unchanged);
        assert!(config.openapi.remote_refs);
        assert_eq!(config.openapi.timeout_secs, 30);
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
[db]
path = "/tmp/c.sqlite"

[catalog]
root = "/srv/catalog"
exclude_globs = ["**/drafts/**"]

[build]
on_load_error = "skip"
duplicates = "reject_conflicts"
skip_unchanged = true

[openapi]
remote_refs = false
timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.build.on_load_error, OnLoadError::Skip);
        assert_eq!(config.build.duplicates, DuplicatePolicy::RejectConflicts);
        assert!(config.build.skip_unchanged);
        assert!(!config.openapi.remote_refs);
        assert_eq!(config.catalog.exclude_globs, vec!["**/drafts/**"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse("[build]\non_load_error = \"ignore\"\n").is_err());
        assert!(parse("[openapi]\ntimeout_secs = 0\n").is_err());
        assert!(parse("[catalog]\nexclude_globs = [\"a/[\"]\n").is_err());
    }

    #[test]
    fn test_db_path_override() {
        let mut config = Config::default();
        apply_db_path_override(&mut config, Some("  ".into()));
        assert_eq!(config.db.path, PathBuf::from("./data/catalog.sqlite"));
        apply_db_path_override(&mut config, Some("/var/lib/catalog.db".into()));
        assert_eq!(config.db.path, PathBuf::from("/var/lib/catalog.db"));
        apply_db_path_override(&mut config, None);
        assert_eq!(config.db.path, PathBuf::from("/var/lib/catalog.db"));
    }
}

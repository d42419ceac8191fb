//! End-to-end tests that drive the `catalog` binary against a temporary
//! catalog tree and database.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn catalog_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("catalog");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("catalog");

    let write = |rel: &str, contents: &str| {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    };
    write("domains/Orders/index.md", "---\nsummary: Orders\n---\n# Orders\n");
    write(
        "domains/Orders/services/OrderService/index.md",
        "---\nsummary: Takes orders\n---\n",
    );
    write(
        "domains/Orders/events/OrderPlaced/index.md",
        "---\nversion: 1.0.0\nproducers: [OrderService]\n---\nPlaced.\n",
    );
    write(
        "domains/Orders/events/OrderPlaced/schema.json",
        "{\"type\": \"object\"}",
    );

    let config_path = tmp.path().join("catalog.toml");
    let config_content = format!(
        r#"[db]
path = "{}"

[catalog]
root = "{}"
fingerprint_path = "{}"

[openapi]
remote_refs = false
"#,
        tmp.path().join("data/catalog.sqlite").display(),
        root.display(),
        tmp.path().join("catalogHash.json").display(),
    );
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_catalog(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = catalog_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("DB_PATH")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run {:?}: {}", binary, e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_catalog(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/catalog.sqlite").exists());

    let (_, stderr, success) = run_catalog(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_build_then_rebuild_if_changed() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config, &["build"]);
    assert!(success, "build failed: {}", stderr);
    assert!(stdout.contains("schema: created"));
    assert!(stdout.trim_end().ends_with("ok"));
    assert!(tmp.path().join("catalogHash.json").exists());

    let (stdout, stderr, success) = run_catalog(&config, &["build", "--if-changed"]);
    assert!(success, "second build failed: {}", stderr);
    assert!(stdout.contains("unchanged:"));

    fs::write(
        tmp.path().join("catalog/domains/Orders/events/OrderPlaced/index.md"),
        "---\nversion: 1.1.0\n---\n",
    )
    .unwrap();
    let (stdout, stderr, success) = run_catalog(&config, &["build", "--if-changed"]);
    assert!(success, "changed build failed: {}", stderr);
    assert!(stdout.contains("schema: truncated"));
}

#[test]
fn test_build_fresh() {
    let (_tmp, config) = setup_test_env();
    run_catalog(&config, &["build"]);
    let (stdout, stderr, success) = run_catalog(&config, &["build", "--fresh"]);
    assert!(success, "fresh build failed: {}", stderr);
    assert!(stdout.contains("schema: created"));
}

#[test]
fn test_build_json_progress() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_catalog(&config, &["build", "--progress", "json"]);
    assert!(success, "build failed: {}", stderr);
    assert!(stderr.contains("\"event\""));
}

#[test]
fn test_build_missing_index_fails() {
    let (tmp, config) = setup_test_env();
    fs::create_dir_all(tmp.path().join("catalog/domains/Empty")).unwrap();
    fs::write(tmp.path().join("catalog/domains/Empty/notes.txt"), "no index").unwrap();

    let (stdout, stderr, success) = run_catalog(&config, &["build"]);
    assert!(!success);
    assert!(!stdout.contains("ok"));
    assert!(stderr.contains("/domains/Empty"), "stderr: {}", stderr);
    assert!(!tmp.path().join("catalogHash.json").exists());
}

#[test]
fn test_build_missing_root_fails() {
    let (tmp, config) = setup_test_env();
    fs::remove_dir_all(tmp.path().join("catalog")).unwrap();
    let (_, _, success) = run_catalog(&config, &["build"]);
    assert!(!success);
}

#[test]
fn test_stats_and_drop() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, success) = run_catalog(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("No catalog tables"));

    run_catalog(&config, &["build"]);
    let (stdout, stderr, success) = run_catalog(&config, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("events"));
    assert!(stdout.contains("Orders"));
    assert!(stdout.contains("Unspecified"));

    let (stdout, stderr, success) = run_catalog(&config, &["drop"]);
    assert!(success, "drop failed: {}", stderr);
    assert!(stdout.contains("ok"));

    let (stdout, _, _) = run_catalog(&config, &["stats"]);
    assert!(stdout.contains("No catalog tables"));
}

#[test]
fn test_fingerprint() {
    let (tmp, config) = setup_test_env();

    let (stdout, _, success) = run_catalog(&config, &["fingerprint"]);
    assert!(success);
    assert!(stdout.contains("stored:  none"));
    assert!(stdout.contains("status:  changed"));
    assert!(!tmp.path().join("catalogHash.json").exists());

    run_catalog(&config, &["fingerprint", "--write"]);
    let (stdout, _, success) = run_catalog(&config, &["fingerprint"]);
    assert!(success);
    assert!(stdout.contains("status:  unchanged"));
}

#[test]
fn test_classify() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, success) =
        run_catalog(&config, &["classify", "/domains/Orders/events/OrderPlaced/versions/0.0.1"]);
    assert!(success);
    assert!(stdout.contains("kind:    event"));
    assert!(stdout.contains("domain:  Orders"));
    assert!(stdout.contains("version: 0.0.1"));
    assert!(stdout.contains("latest:  false"));

    let (stdout, _, success) = run_catalog(&config, &["classify", "/random/dir"]);
    assert!(success);
    assert!(stdout.contains("not a catalog directory"));
}

#[test]
fn test_db_path_env_override() {
    let (tmp, config) = setup_test_env();
    let override_path = tmp.path().join("elsewhere.sqlite");

    let output = Command::new(catalog_binary())
        .arg("--config")
        .arg(&config)
        .arg("init")
        .env("DB_PATH", &override_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(override_path.exists());
    assert!(!tmp.path().join("data/catalog.sqlite").exists());
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_catalog(&tmp.path().join("nope.toml"), &["build"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

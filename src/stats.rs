//! Catalog database statistics.
//!
//! Gives a quick summary of what the last build produced: row counts per
//! table, a per-domain breakdown, database size and the stored fingerprint.
//! Used by `catalog stats` to confirm builds are landing as expected.

use anyhow::Result;
use sqlx::Row;

use event_catalog_core::store::CatalogStore;

use crate::config::Config;
use crate::fingerprint::read_fingerprint;
use crate::sqlite_store::SqliteStore;

/// Per-domain breakdown of latest events and services.
struct DomainStats {
    domain: String,
    events: i64,
    services: i64,
    docs: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Event Catalog Database Stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));

    let fingerprint_path = &config.catalog.fingerprint_path;
    match read_fingerprint(fingerprint_path) {
        Some(fp) => {
            let updated = std::fs::metadata(fingerprint_path)
                .and_then(|m| m.modified())
                .ok()
                .map(|t| format_ts_relative(chrono::DateTime::<chrono::Utc>::from(t).timestamp()))
                .unwrap_or_else(|| "unknown".to_string());
            println!("  Fingerprint: {} ({})", fp, updated);
        }
        None => println!("  Fingerprint: none"),
    }
    println!();

    if !store.has_schema().await? {
        println!("  No catalog tables. Run `catalog build` first.");
        println!();
        store.close().await;
        return Ok(());
    }

    println!("  {:<16} {:>8}", "TABLE", "ROWS");
    println!("  {}", "-".repeat(25));
    for count in store.table_counts().await? {
        println!("  {:<16} {:>8}", count.table, count.rows);
    }

    let domain_rows = sqlx::query(
        r#"
        SELECT
            d.name AS domain,
            (SELECT COUNT(*) FROM events e WHERE e.domain_name = d.name AND e.is_latest) AS events,
            (SELECT COUNT(*) FROM services s WHERE s.domain_name = d.name) AS services,
            (SELECT COUNT(*) FROM docs c WHERE c.domain_name = d.name) AS docs
        FROM domains d
        ORDER BY d.name
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let domain_stats: Vec<DomainStats> = domain_rows
        .iter()
        .map(|row| DomainStats {
            domain: row.get("domain"),
            events: row.get("events"),
            services: row.get("services"),
            docs: row.get("docs"),
        })
        .collect();

    if !domain_stats.is_empty() {
        println!();
        println!("  By domain:");
        println!(
            "  {:<24} {:>7} {:>9} {:>6}",
            "DOMAIN", "EVENTS", "SERVICES", "DOCS"
        );
        println!("  {}", "-".repeat(49));
        for d in &domain_stats {
            println!(
                "  {:<24} {:>7} {:>9} {:>6}",
                d.domain, d.events, d.services, d.docs
            );
        }
    }

    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

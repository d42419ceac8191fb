//! # Event Catalog CLI (`catalog`)
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog init` | Create the SQLite database and catalog tables |
//! | `catalog build` | Load the catalog tree into the database |
//! | `catalog drop` | Drop every catalog table |
//! | `catalog fingerprint` | Show (and optionally store) the catalog fingerprint |
//! | `catalog classify <path>` | Show how a catalog path is classified |
//! | `catalog stats` | Row counts, database size and stored fingerprint |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use event_catalog::progress::ProgressMode;
use event_catalog::{config, fingerprint, ingest, logging, migrate, stats};
use event_catalog_core::classify::{classify, matching_pattern, CatalogPath};

/// Event Catalog CLI: compile a directory of domain, service, event and
/// owner descriptors into a SQLite database.
#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Compile an event catalog directory into a SQLite database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/catalog.toml`. The `DB_PATH` environment
    /// variable overrides `[db] path`.
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the database and all catalog tables.
    ///
    /// Idempotent: existing tables and rows are left alone.
    Init,

    /// Build the catalog into the database.
    ///
    /// Scans the catalog root, loads every recognized directory, and
    /// replaces the database contents in a single transaction.
    Build {
        /// Drop every table before building.
        #[arg(long)]
        fresh: bool,

        /// Skip the build when the catalog fingerprint matches the stored one.
        #[arg(long)]
        if_changed: bool,

        /// Progress on stderr: off, human, or json.
        /// Default is human when stderr is a TTY, otherwise off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Drop every catalog table, including legacy ones.
    Drop,

    /// Compute the catalog fingerprint and compare it with the stored one.
    Fingerprint {
        /// Store the computed fingerprint.
        #[arg(long)]
        write: bool,
    },

    /// Show how a catalog-relative directory path is classified.
    Classify {
        /// Path such as `/domains/Orders/events/OrderPlaced`.
        path: String,
    },

    /// Show database statistics.
    Stats,
}

fn print_classification(path: &str) {
    let Some(classified) = classify(path) else {
        println!("{}: not a catalog directory", path);
        return;
    };
    println!("{}", path);
    if let Some(pattern) = matching_pattern(path) {
        println!("  pattern: {:?}", pattern);
    }
    println!("  kind:    {}", classified.kind());
    match &classified {
        CatalogPath::Domain { domain } => println!("  domain:  {}", domain),
        CatalogPath::Owner { email } => println!("  email:   {}", email),
        CatalogPath::Service { domain, service } => {
            println!("  domain:  {}", domain.as_deref().unwrap_or("Unspecified"));
            println!("  service: {}", service);
        }
        CatalogPath::Event {
            domain,
            event,
            version,
        } => {
            println!("  domain:  {}", domain.as_deref().unwrap_or("Unspecified"));
            println!("  event:   {}", event);
            println!("  version: {}", version.as_deref().unwrap_or("(latest)"));
            println!("  latest:  {}", classified.is_latest());
        }
        CatalogPath::Docs { domain, service } => {
            println!("  domain:  {}", domain.as_deref().unwrap_or("Unspecified"));
            if let Some(service) = service {
                println!("  service: {}", service);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    // Commands that don't require config
    if let Commands::Classify { path } = &cli.command {
        print_classification(path);
        return Ok(());
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Build {
            fresh,
            if_changed,
            progress,
        } => {
            if if_changed {
                cfg.build.skip_unchanged = true;
            }
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            ingest::run_build(&cfg, fresh, reporter.as_ref()).await?;
        }
        Commands::Drop => {
            ingest::run_drop(&cfg).await?;
        }
        Commands::Fingerprint { write } => {
            fingerprint::run_fingerprint(&cfg, write)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Classify { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

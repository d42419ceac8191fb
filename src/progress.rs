//! Build progress reporting.
//!
//! Reports observable progress during `catalog build` so users see how many
//! directories are being loaded and when the database is written. Progress
//! is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a build.
#[derive(Clone, Debug)]
pub enum BuildProgressEvent {
    /// Walking the catalog tree. Total unknown.
    Scanning { root: String },
    /// `n` of `total` classified directories loaded.
    Loading { n: u64, total: u64 },
    /// Writing `rows` rows to the database.
    Persisting { rows: u64 },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the build pipeline.
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr: "build  loading  12 / 40 directories".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Scanning { root } => format!("build {}  scanning...\n", root),
            BuildProgressEvent::Loading { n, total } => format!(
                "build  loading  {} / {} directories\n",
                format_number(*n),
                format_number(*total)
            ),
            BuildProgressEvent::Persisting { rows } => {
                format!("build  writing  {} rows\n", format_number(*rows))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        let obj = match &event {
            BuildProgressEvent::Scanning { root } => serde_json::json!({
                "event": "progress",
                "phase": "scanning",
                "root": root
            }),
            BuildProgressEvent::Loading { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "loading",
                "n": n,
                "total": total
            }),
            BuildProgressEvent::Persisting { rows } => serde_json::json!({
                "event": "progress",
                "phase": "persisting",
                "rows": rows
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller can pass it to the build.
    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

//! Tracing conventions for scdferry.
//!
//! The pipeline emits `tracing` events under a common target prefix; consumers
//! bring their own subscriber. This module only centralizes the naming so logs
//! can be filtered and asserted on consistently:
//!
//! ```text
//! RUST_LOG=scdferry=debug
//! ```

use tracing::Level;

/// Target prefix used by all scdferry tracing spans and events.
pub const TARGET_PREFIX: &str = "scdferry";

/// Standard tracing targets used across the pipeline.
pub mod targets {
    /// Ingest coordinator: scan, relocate, dispatch.
    pub const INGEST: &str = "scdferry.ingest";
    /// Batch relocation into ingest directories.
    pub const RELOCATE: &str = "scdferry.relocate";
    /// Role-aware command dispatch.
    pub const DISPATCH: &str = "scdferry.dispatch";
    /// Rebuild orchestration lifecycle.
    pub const REBUILD: &str = "scdferry.rebuild";
    /// The directory-swap step of a rebuild.
    pub const SWAP: &str = "scdferry.rebuild.swap";
    /// Per-collection notification workers.
    pub const WORKER: &str = "scdferry.worker";
}

/// Standard structured field names used in tracing events.
pub mod field_names {
    pub const COLLECTION: &str = "collection";
    pub const CHANNEL: &str = "channel";
    pub const SOURCE_DIR: &str = "source_dir";
    pub const DEST_DIR: &str = "dest_dir";
    pub const FILE_COUNT: &str = "file_count";
    pub const ACTION: &str = "action";
    pub const URI: &str = "uri";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
/// Returns `None` for unrecognized strings.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Returns the recommended `tracing::Level` for the given environment.
///
/// Checks `SCDFERRY_LOG_LEVEL` first, then falls back to the provided default.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("SCDFERRY_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}

//! SCD directory scanning.
//!
//! A scan lists one directory, keeps the regular files whose names pass the
//! [`ScdFileName`] recognition rule, and returns them in file-name order so
//! relocation batches are deterministic regardless of readdir order.

use std::path::{Path, PathBuf};

use tracing::debug;

use scdferry_core::tracing_config::targets;
use scdferry_core::{FerryResult, ScdFileName};

/// List `dir` and return the recognized SCD batch files in it, sorted by
/// file name.
///
/// An empty result is not an error: "no new data" is an idempotent no-op for
/// the caller.
///
/// # Errors
///
/// Returns `Io` when the directory cannot be read. Unreadable individual
/// entries are skipped.
pub fn scan_scd_files(dir: &Path) -> FerryResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if ScdFileName::is_recognized(name) {
            debug!(
                target: targets::INGEST,
                file = name,
                dir = %dir.display(),
                "found SCD file"
            );
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

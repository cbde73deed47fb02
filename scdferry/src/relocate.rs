//! Batch file relocation into ingest directories.
//!
//! Multiple upstream producers may emit identically named batch files that get
//! merged into one target directory; the 2-digit slot field inside each SCD
//! name is the deconfliction mechanism. [`relocate_batch`] bumps the slot on
//! collision instead of overwriting, and rolls the whole batch back when a
//! prefix runs out of slots. [`stage_overwrite`] is the rebuild-snapshot
//! staging variant that replaces existing destination files instead.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use scdferry_core::tracing_config::targets;
use scdferry_core::{FerryError, FerryResult, ScdFileName};

/// Copy `files` into `dest` under collision-avoidant names, in input order,
/// all-or-nothing.
///
/// Per file the destination name starts as the source base name; while a file
/// already occupies it (or the copy fails), the slot field is incremented and
/// the probe retried. Slots never wrap: reaching 99 without a placement fails
/// the file, which fails the batch.
///
/// On success returns the placed paths, one per input. On failure every file
/// this call already placed is deleted, leaving `dest` exactly as it was.
///
/// # Errors
///
/// - [`FerryError::InvalidScdName`] when a source base name lacks the SCD layout.
/// - [`FerryError::SlotExhausted`] when a file finds no free slot; the batch
///   has been rolled back.
pub fn relocate_batch(files: &[PathBuf], dest: &Path) -> FerryResult<Vec<PathBuf>> {
    let mut placed: Vec<PathBuf> = Vec::with_capacity(files.len());
    for file in files {
        match place_one(file, dest) {
            Ok(target) => placed.push(target),
            Err(err) => {
                roll_back(&placed);
                return Err(err);
            }
        }
    }
    debug!(
        target: targets::RELOCATE,
        file_count = placed.len(),
        dest_dir = %dest.display(),
        "relocation batch committed"
    );
    Ok(placed)
}

fn place_one(file: &Path, dest: &Path) -> FerryResult<PathBuf> {
    let base = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FerryError::InvalidScdName {
            name: file.display().to_string(),
            reason: "path has no UTF-8 base name".into(),
        })?;
    let mut name = ScdFileName::parse(base)?;

    loop {
        let candidate = dest.join(name.as_str());
        if !candidate.exists() {
            match std::fs::copy(file, &candidate) {
                Ok(_) => return Ok(candidate),
                Err(err) => {
                    // Retryable, same as a taken slot: another producer may
                    // have claimed the name between the probe and the copy.
                    debug!(
                        target: targets::RELOCATE,
                        file = %candidate.display(),
                        error = %err,
                        "copy failed, trying next slot"
                    );
                }
            }
        }
        name = match name.with_next_slot() {
            Some(next) => next,
            None => {
                return Err(FerryError::SlotExhausted {
                    file: file.to_path_buf(),
                    dest: dest.to_path_buf(),
                });
            }
        };
    }
}

fn roll_back(placed: &[PathBuf]) {
    for path in placed {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(
                target: targets::RELOCATE,
                file = %path.display(),
                error = %err,
                "rollback could not remove placed file"
            );
        }
    }
}

/// Copy `files` into `dest` under their own names with overwrite semantics.
///
/// Used only for staging rebuild-snapshot aggregate data: an existing
/// destination entry is deleted before the copy, nothing is renamed, and no
/// rollback is tracked.
///
/// # Errors
///
/// Propagates the first delete or copy failure as `Io`.
pub fn stage_overwrite(files: &[PathBuf], dest: &Path) -> FerryResult<()> {
    for file in files {
        let base = file
            .file_name()
            .ok_or_else(|| FerryError::InvalidScdName {
                name: file.display().to_string(),
                reason: "path has no base name".into(),
            })?;
        let target = dest.join(base);
        match std::fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&target)?,
            Ok(_) => std::fs::remove_file(&target)?,
            Err(_) => {}
        }
        std::fs::copy(file, &target)?;
    }
    Ok(())
}

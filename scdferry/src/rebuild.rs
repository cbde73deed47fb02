//! Full-collection rebuild orchestration.
//!
//! A rebuild builds a complete replacement index in a shadow collection while
//! the live one keeps serving, then swaps the live data directory for the
//! shadow's in a short stop-the-collection window. The swap keeps a `-backup`
//! sibling of the old live directory for rollback, carries the SCD receive
//! log over from it, and always attempts to restart the live collection no
//! matter which branch the swap took.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use tracing::{debug, error, info, warn};

use scdferry_core::tracing_config::targets;
use scdferry_core::{
    CollectionRegistry, DocumentSnapshot, FerryConfig, FerryError, FerryResult, IndexService,
};

/// How a rebuild request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The rebuild ran to the end of the sequence (swap sub-step failures are
    /// logged, rolled back where possible, and do not change the outcome).
    Completed,
    /// Another rebuild of the same collection was already in flight; nothing
    /// was done.
    AlreadyRunning,
}

/// Everything the swap step needs, captured before any collection is stopped.
struct SwapPlan {
    live_dir: PathBuf,
    shadow_dir: PathBuf,
    shadow_base: PathBuf,
}

/// Orchestrates rebuilds of one collection, at most one at a time.
pub struct RebuildOrchestrator {
    collection: String,
    registry: Arc<dyn CollectionRegistry>,
    config: FerryConfig,
    running: AtomicBool,
}

/// Releases the single-flight flag on every exit path.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RebuildOrchestrator {
    /// Build an orchestrator for `collection`.
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        registry: Arc<dyn CollectionRegistry>,
        config: FerryConfig,
    ) -> Self {
        Self {
            collection: collection.into(),
            registry,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a rebuild is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one full rebuild of the collection.
    ///
    /// Concurrent calls are rejected with [`RebuildOutcome::AlreadyRunning`]
    /// rather than queued. Failures before the live collection is stopped
    /// leave it untouched and return an error; once the swap window opens,
    /// sub-step failures are logged and rolled back where possible, and the
    /// orchestrator always reaches the restart step.
    ///
    /// # Errors
    ///
    /// Returns [`FerryError::CollectionNotFound`] when the collection or its
    /// config file is unknown, `RebuildAlreadyStarted` when a stale shadow
    /// collection is still registered, and the engine's error when the shadow
    /// re-index fails.
    pub fn rebuild(&self) -> FerryResult<RebuildOutcome> {
        if self.running.swap(true, Ordering::AcqRel) {
            error!(
                target: targets::REBUILD,
                collection = %self.collection,
                "still in rebuilding"
            );
            return Ok(RebuildOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        info!(target: targets::REBUILD, collection = %self.collection, "start rebuilding");
        let config_file =
            self.registry
                .config_file(&self.collection)
                .ok_or_else(|| FerryError::CollectionNotFound {
                    collection: self.collection.clone(),
                })?;
        let shadow_name = self.config.shadow_name(&self.collection);

        let plan = self.build_shadow(&shadow_name, &config_file)?;

        info!(target: targets::REBUILD, collection = %self.collection, "stop collection");
        self.registry.stop_collection(&self.collection);
        self.registry.stop_collection(&shadow_name);

        self.swap_directories(&plan);

        if let Err(err) = self
            .registry
            .start_collection(&self.collection, &config_file, false)
        {
            error!(
                target: targets::REBUILD,
                collection = %self.collection,
                error = %err,
                "failed to restart collection after rebuild"
            );
        }
        info!(target: targets::REBUILD, collection = %self.collection, "end rebuilding");
        Ok(RebuildOutcome::Completed)
    }

    /// Phase 1: capture the live snapshot, start the shadow collection, and
    /// drive its full re-index. The live collection keeps serving throughout,
    /// and its read guard stays held until this phase ends: the re-index reads
    /// from the captured snapshot, so nothing may stop or mutate the live
    /// collection underneath it.
    fn build_shadow(&self, shadow_name: &str, config_file: &Path) -> FerryResult<SwapPlan> {
        let live_lock = self.registry.collection_lock(&self.collection);
        let _live_held = read_or_recover(&live_lock);
        let (snapshot, live_dir) = {
            let service = self.index_service(&self.collection)?;
            (service.document_snapshot(), service.collection_layout().live_dir())
        };

        info!(
            target: targets::REBUILD,
            collection = %self.collection,
            shadow = shadow_name,
            "start shadow collection"
        );
        self.registry
            .start_collection(shadow_name, config_file, true)?;

        match self.reindex_shadow(shadow_name, &snapshot) {
            Ok((shadow_dir, shadow_base)) => Ok(SwapPlan {
                live_dir,
                shadow_dir,
                shadow_base,
            }),
            Err(err) => {
                warn!(
                    target: targets::REBUILD,
                    collection = %self.collection,
                    error = %err,
                    "shadow rebuild failed, tearing the shadow down"
                );
                self.registry.stop_collection(shadow_name);
                Err(err)
            }
        }
    }

    /// Re-index the shadow collection from the captured snapshot, removing its
    /// workspace when the engine fails.
    fn reindex_shadow(
        &self,
        shadow_name: &str,
        snapshot: &Arc<dyn DocumentSnapshot>,
    ) -> FerryResult<(PathBuf, PathBuf)> {
        let lock = self.registry.collection_lock(shadow_name);
        let _held = read_or_recover(&lock);
        let service = self.index_service(shadow_name)?;
        let layout = service.collection_layout();

        info!(target: targets::REBUILD, shadow = shadow_name, "start rebuilding data");
        if let Err(err) = service.reindex_from(snapshot) {
            remove_dir_best_effort(&layout.base_path, "shadow workspace");
            return Err(err);
        }
        Ok((layout.live_dir(), layout.base_path))
    }

    /// Phase 2: the stop-the-collection swap window. Every sub-step failure is
    /// logged; a failed promotion is rolled back; control always falls through
    /// to the caller's restart.
    fn swap_directories(&self, plan: &SwapPlan) {
        info!(
            target: targets::SWAP,
            collection = %self.collection,
            live_dir = %plan.live_dir.display(),
            shadow_dir = %plan.shadow_dir.display(),
            "replacing live collection data"
        );
        let backup = backup_path(&plan.live_dir);
        remove_dir_best_effort(&backup, "stale backup");

        if let Err(err) = fs::rename(&plan.live_dir, &backup) {
            error!(
                target: targets::SWAP,
                collection = %self.collection,
                error = %err,
                "could not set the live directory aside, swap abandoned"
            );
            remove_dir_best_effort(&plan.shadow_base, "shadow workspace");
            return;
        }

        match fs::rename(&plan.shadow_dir, &plan.live_dir) {
            Ok(()) => self.carry_over_scd_log(&plan.live_dir, &backup),
            Err(err) => {
                error!(
                    target: targets::SWAP,
                    collection = %self.collection,
                    error = %err,
                    "could not promote the rebuilt directory, rolling back"
                );
                if let Err(err) = fs::rename(&backup, &plan.live_dir) {
                    error!(
                        target: targets::SWAP,
                        collection = %self.collection,
                        backup_dir = %backup.display(),
                        error = %err,
                        "rollback failed, live data remains at the backup path"
                    );
                }
                // The restored directory already carries its own receive log,
                // so the carry-over step is skipped on this branch.
            }
        }

        remove_dir_best_effort(&plan.shadow_base, "shadow workspace");
    }

    /// Copy the SCD receive log from the set-aside directory into the freshly
    /// promoted one so receive history survives the swap.
    fn carry_over_scd_log(&self, live_dir: &Path, backup: &Path) {
        let log_name = &self.config.scd_log_name;
        let fresh = live_dir.join(log_name);
        match fs::remove_file(&fresh) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(
                    target: targets::SWAP,
                    path = %fresh.display(),
                    error = %err,
                    "could not clear the rebuilt SCD log"
                );
            }
        }
        if let Err(err) = fs::copy(backup.join(log_name), &fresh) {
            warn!(
                target: targets::SWAP,
                collection = %self.collection,
                error = %err,
                "could not carry the SCD log over from the backup"
            );
        }
    }

    fn index_service(&self, name: &str) -> FerryResult<Arc<dyn IndexService>> {
        self.registry
            .find_handler(name)
            .and_then(|handler| handler.index_service.clone())
            .ok_or_else(|| FerryError::CollectionNotFound {
                collection: name.to_owned(),
            })
    }
}

fn backup_path(live_dir: &Path) -> PathBuf {
    let mut name = live_dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push("-backup");
    live_dir.with_file_name(name)
}

fn remove_dir_best_effort(dir: &Path, what: &str) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!(target: targets::SWAP, path = %dir.display(), "removed {what}"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(
                target: targets::SWAP,
                path = %dir.display(),
                error = %err,
                "could not remove {what}"
            );
        }
    }
}

fn read_or_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target: targets::REBUILD, "collection lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

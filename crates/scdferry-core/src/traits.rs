//! Contracts for the external collaborators of the scdferry pipeline.
//!
//! - [`RoleResolver`]: cluster role of the local node (distributed? primary?).
//! - [`StorageProbe`]: whether SCD directories sit on shared storage.
//! - [`WriteQueue`]: the primary coordinator's write-request queue.
//! - [`IndexService`] / [`CollectionRegistry`]: the per-collection index engine
//!   and its lifecycle registry.
//!
//! Every collaborator is an explicit trait injected at construction; there are
//! no process-wide singletons. All operations are synchronous and blocking,
//! matching the rest of the pipeline.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::FerryResult;
use crate::types::{CollectionLayout, WriteCommand};

// ─── Role resolver ──────────────────────────────────────────────────────────

/// Reports the local node's cluster role.
pub trait RoleResolver: Send + Sync {
    /// Whether this node is part of a distributed deployment.
    fn is_distributed(&self) -> bool;

    /// Whether this node is the write-authoritative primary.
    ///
    /// Only meaningful when [`is_distributed`](Self::is_distributed) is true.
    fn is_primary(&self) -> bool;
}

/// Fixed-role resolver for tests and deployments whose role never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRoleResolver {
    /// Distributed deployment flag.
    pub distributed: bool,
    /// Primary-role flag.
    pub primary: bool,
}

impl StaticRoleResolver {
    /// A non-distributed, single-node deployment.
    #[must_use]
    pub const fn single_node() -> Self {
        Self {
            distributed: false,
            primary: false,
        }
    }

    /// The primary node of a distributed deployment.
    #[must_use]
    pub const fn primary() -> Self {
        Self {
            distributed: true,
            primary: true,
        }
    }

    /// A replica node of a distributed deployment.
    #[must_use]
    pub const fn replica() -> Self {
        Self {
            distributed: true,
            primary: false,
        }
    }
}

impl RoleResolver for StaticRoleResolver {
    fn is_distributed(&self) -> bool {
        self.distributed
    }

    fn is_primary(&self) -> bool {
        self.primary
    }
}

// ─── Storage probe ──────────────────────────────────────────────────────────

/// Reports whether SCD directories sit on a shared/distributed filesystem
/// visible identically from all nodes.
pub trait StorageProbe: Send + Sync {
    /// True when no physical copy between nodes is needed.
    fn is_shared(&self) -> bool;
}

/// Fixed-topology probe for tests and static deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticStorageProbe {
    /// Shared-storage flag.
    pub shared: bool,
}

impl StaticStorageProbe {
    /// Node-local disks: files must be copied explicitly.
    #[must_use]
    pub const fn node_local() -> Self {
        Self { shared: false }
    }

    /// Shared filesystem: paths resolve identically everywhere.
    #[must_use]
    pub const fn shared() -> Self {
        Self { shared: true }
    }
}

impl StorageProbe for StaticStorageProbe {
    fn is_shared(&self) -> bool {
        self.shared
    }
}

// ─── Write queue ────────────────────────────────────────────────────────────

/// The primary coordinator's write-request queue.
///
/// Pushes are fire-and-forget from this subsystem's point of view: delivery
/// and execution acknowledgment are owned by the external queue.
pub trait WriteQueue: Send + Sync {
    /// Hand one command to the queue.
    fn push(&self, command: WriteCommand);
}

/// Queue that drops every command; used by tests and dry-run scenarios.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWriteQueue;

impl WriteQueue for NoopWriteQueue {
    fn push(&self, _command: WriteCommand) {}
}

// ─── Index service ──────────────────────────────────────────────────────────

/// Opaque handle to a collection's committed document set.
///
/// Captured from the live collection under its registry lock and consumed by
/// the shadow collection's full re-index. The pipeline never looks inside.
pub trait DocumentSnapshot: Send + Sync {}

/// Per-collection index engine contract.
pub trait IndexService: Send + Sync {
    /// Synchronously index staged SCD data.
    ///
    /// `scd_path` of `None` means "use your own known staging directory";
    /// files have already been relocated there by the coordinator.
    ///
    /// # Errors
    ///
    /// Returns the engine's failure; the coordinator propagates it unchanged.
    fn index_scd(&self, scd_path: Option<&Path>) -> FerryResult<()>;

    /// The staging directory for this collection's SCD data.
    ///
    /// Rebuild-snapshot data uses a distinct sub-path from incremental data.
    fn scd_dir(&self, rebuild: bool) -> PathBuf;

    /// Capture a consistent handle to the committed document set.
    fn document_snapshot(&self) -> Arc<dyn DocumentSnapshot>;

    /// Drive a full re-index of this collection from a captured snapshot.
    ///
    /// This is the long-running blocking call at the heart of a rebuild; it
    /// reads from the already-committed document set, not from raw SCD input.
    ///
    /// # Errors
    ///
    /// Returns the engine's failure; the orchestrator aborts the rebuild.
    fn reindex_from(&self, docs: &Arc<dyn DocumentSnapshot>) -> FerryResult<()>;

    /// The collection's on-disk workspace layout.
    fn collection_layout(&self) -> CollectionLayout;
}

/// What the registry resolves a collection name to.
///
/// `index_service` is `None` for collections registered without an index
/// capability; the rebuild orchestrator treats that the same as an absent
/// handler.
pub struct CollectionHandler {
    /// The collection's index engine, if it has one.
    pub index_service: Option<Arc<dyn IndexService>>,
}

// ─── Collection registry ────────────────────────────────────────────────────

/// Registry of running collections: lifecycle, lookup, and per-collection
/// read/write locks.
pub trait CollectionRegistry: Send + Sync {
    /// Start a collection from its config file.
    ///
    /// `rebuild_mode` marks shadow collections built during a rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`FerryError::RebuildAlreadyStarted`] when a collection with
    /// this name is already active.
    ///
    /// [`FerryError::RebuildAlreadyStarted`]: crate::FerryError::RebuildAlreadyStarted
    fn start_collection(
        &self,
        name: &str,
        config_file: &Path,
        rebuild_mode: bool,
    ) -> FerryResult<()>;

    /// Stop (unload) a collection. Unknown names are a no-op.
    fn stop_collection(&self, name: &str);

    /// Resolve a collection name to its running handler.
    fn find_handler(&self, name: &str) -> Option<Arc<CollectionHandler>>;

    /// The per-collection read/write lock guarding handler use.
    ///
    /// Held for read while resolving/using a handler and while driving a
    /// re-index; released before stop/swap/restart sequences.
    fn collection_lock(&self, name: &str) -> Arc<RwLock<()>>;

    /// Path of the collection's config file, used to restart it and to start
    /// its shadow twin.
    fn config_file(&self, name: &str) -> Option<PathBuf>;
}

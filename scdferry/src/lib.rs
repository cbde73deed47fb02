//! # scdferry
//!
//! Batch document (SCD) ingest and index-rebuild backbone for a clustered
//! search service.
//!
//! An SCD batch file carries a fixed-layout name: a 2-character type code, a
//! 2-digit slot used for collision avoidance, and a free-form remainder. When
//! a notification layer reports that new batches may be available, scdferry
//! reconciles them into the owning collection's staging directory and then
//! dispatches by cluster role: the primary of a distributed deployment relays
//! a structured write command to its queue, replicas stay quiet, and a
//! single-node deployment indexes locally.
//!
//! The second half of the crate is the rebuild orchestrator: it builds a
//! complete replacement index in a shadow collection while the live one keeps
//! serving, then swaps directories in a short stop window with a `-backup`
//! rollback path.
//!
//! ```text
//!  notification ──► IngestWorker ──► IngestCoordinator
//!                                     │  scan + relocate (slot bump on clash)
//!                                     └─► dispatch: queue / no-op / local index
//!
//!  rebuild request ──► RebuildOrchestrator
//!                       shadow build ─► stop ─► swap (+backup) ─► restart
//! ```
//!
//! ## Crate Layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`scdferry-core`](scdferry_core) | Types, traits, errors, config |
//! | `scdferry` | Scan, relocation, ingest coordination, workers, rebuild |
//!
//! ## Key Types
//!
//! - [`IngestCoordinator`] — scan, relocate, and role-aware dispatch
//! - [`IngestWorker`] — per-collection single-consumer notification queue
//! - [`RebuildOrchestrator`] — shadow build and directory swap
//! - [`ScdFileName`] — the fixed-layout batch file name and its slot logic
//! - [`WriteCommand`] — the structured request relayed to the primary's queue
//!
//! All operations are synchronous and blocking; concurrency control is
//! structural (one worker thread per collection, single-flight rebuilds)
//! rather than runtime-based.

pub mod ingest;
pub mod rebuild;
pub mod relocate;
pub mod scan;
pub mod worker;

// ─── Core re-exports (flat import surface) ──────────────────────────────────

pub use scdferry_core::error::{FerryError, FerryResult};

pub use scdferry_core::config::{FerryConfig, ReceiverConfig};

pub use scdferry_core::types::{
    CollectionLayout, IngestChannel, MAX_SLOT, ScdFileName, WriteAction, WriteCommand,
};

pub use scdferry_core::traits::{
    CollectionHandler, CollectionRegistry, DocumentSnapshot, IndexService, NoopWriteQueue,
    RoleResolver, StaticRoleResolver, StaticStorageProbe, StorageProbe, WriteQueue,
};

// ─── Pipeline surface ───────────────────────────────────────────────────────

pub use ingest::IngestCoordinator;
pub use rebuild::{RebuildOrchestrator, RebuildOutcome};
pub use relocate::{relocate_batch, stage_overwrite};
pub use scan::scan_scd_files;
pub use worker::{IngestWorker, Notification, NotificationKind};

//! Core traits, types, and error types for the scdferry ingest/rebuild pipeline.
//!
//! This crate defines the shared interfaces (`RoleResolver`, `StorageProbe`,
//! `WriteQueue`, `IndexService`, `CollectionRegistry`), the SCD data model
//! (`ScdFileName`, `WriteCommand`, `CollectionLayout`), error types
//! (`FerryError`), and configuration used across all scdferry crates.
//!
//! It has minimal external dependencies and is intended to be depended on by
//! every other crate in the workspace.

pub mod config;
pub mod error;
pub mod tracing_config;
pub mod traits;
pub mod types;

pub use config::{FerryConfig, ReceiverConfig};
pub use error::{FerryError, FerryResult};
pub use traits::{
    CollectionHandler, CollectionRegistry, DocumentSnapshot, IndexService, NoopWriteQueue,
    RoleResolver, StaticRoleResolver, StaticStorageProbe, StorageProbe, WriteQueue,
};
pub use types::{
    CollectionLayout, IngestChannel, MAX_SLOT, ScdFileName, WriteAction, WriteCommand,
};

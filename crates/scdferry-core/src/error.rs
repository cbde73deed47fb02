use std::path::PathBuf;

/// Unified error type covering all failure modes across the scdferry pipeline.
///
/// Every variant includes an actionable error message guiding the consumer
/// toward resolution. Errors raised before any destructive filesystem mutation
/// always leave the node untouched; errors raised after mutation has begun
/// (`SlotExhausted`) are only returned once the mutation has been rolled back.
#[derive(Debug, thiserror::Error)]
pub enum FerryError {
    // === Registry errors ===
    /// The collection is unknown to the registry, or its handler carries no
    /// index service.
    #[error("Collection not found: {collection}. Check the registry and the collection config.")]
    CollectionNotFound {
        /// Name that failed to resolve.
        collection: String,
    },

    /// The registry refused to start a shadow collection because one with the
    /// same name is already active.
    #[error(
        "Rebuild collection already started: {collection}. A previous rebuild may still be running or was not cleaned up."
    )]
    RebuildAlreadyStarted {
        /// The shadow collection name that was refused.
        collection: String,
    },

    // === Relocation errors ===
    /// A relocation batch could not place a file within slots 00-99.
    /// The destination directory has been restored to its pre-call state.
    #[error(
        "No free slot for {file} in {dest} (slots 00-99 all occupied); batch rolled back. Drain the ingest directory or reduce producer fan-in."
    )]
    SlotExhausted {
        /// The source file that could not be placed.
        file: PathBuf,
        /// The destination directory.
        dest: PathBuf,
    },

    /// A file name does not carry the fixed SCD layout
    /// (2-char type code, 2-digit slot, remainder).
    #[error("Invalid SCD file name \"{name}\": {reason}")]
    InvalidScdName {
        /// The offending name.
        name: String,
        /// What about it is malformed.
        reason: String,
    },

    // === Index engine errors ===
    /// The index engine reported failure for a synchronous index or
    /// shadow re-index operation.
    #[error("Indexing failed for collection {collection}: {source}")]
    IndexFailed {
        /// Collection whose engine failed.
        collection: String,
        /// The underlying engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // === Configuration errors ===
    /// A configuration value is invalid.
    #[error("Invalid config: {field} = \"{value}\": {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    // === I/O errors ===
    /// Wraps `std::io::Error` for filesystem operations outside the
    /// retry/rollback paths that swallow them.
    #[error("I/O error: {0}. Check directory permissions and disk space.")]
    Io(#[from] std::io::Error),
}

impl FerryError {
    /// Helper for wrapping an arbitrary engine error into [`FerryError::IndexFailed`].
    pub fn index_failed(
        collection: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::IndexFailed {
            collection: collection.into(),
            source: Box::new(source),
        }
    }
}

/// Convenience alias used throughout the scdferry crate hierarchy.
pub type FerryResult<T> = Result<T, FerryError>;

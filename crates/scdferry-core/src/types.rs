//! Data model shared across the scdferry pipeline.
//!
//! The central type is [`ScdFileName`], the fixed-layout identifier carried by
//! every SCD batch file: a 2-character type code, a 2-digit decimal slot used
//! for collision avoidance during relocation, and a free-form remainder
//! (typically timestamp + extension). Only the slot field is ever mutated;
//! type code and remainder are preserved verbatim across renames.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FerryError, FerryResult};

/// Byte offset of the 2-digit slot field inside an SCD file name.
const SLOT_OFFSET: usize = 2;
/// Width of the slot field.
const SLOT_WIDTH: usize = 2;
/// Highest slot value; relocation never wraps past it.
pub const MAX_SLOT: u8 = 99;

// ─── ScdFileName ────────────────────────────────────────────────────────────

/// A validated SCD batch file name.
///
/// Layout: `TTSSrest...` where `TT` is the 2-char type code, `SS` the 2-digit
/// slot (00-99), and `rest` the free-form remainder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScdFileName {
    name: String,
}

impl ScdFileName {
    /// Parse and validate a file name against the fixed SCD layout.
    ///
    /// # Errors
    ///
    /// Returns [`FerryError::InvalidScdName`] when the name is shorter than
    /// the type-code + slot prefix, when the prefix is not ASCII, or when the
    /// slot field is not two decimal digits.
    pub fn parse(name: &str) -> FerryResult<Self> {
        let bytes = name.as_bytes();
        if bytes.len() < SLOT_OFFSET + SLOT_WIDTH {
            return Err(FerryError::InvalidScdName {
                name: name.to_owned(),
                reason: "shorter than the 4-byte type-code + slot prefix".into(),
            });
        }
        if !bytes[..SLOT_OFFSET + SLOT_WIDTH].is_ascii() {
            return Err(FerryError::InvalidScdName {
                name: name.to_owned(),
                reason: "type-code/slot prefix must be ASCII".into(),
            });
        }
        let slot = &bytes[SLOT_OFFSET..SLOT_OFFSET + SLOT_WIDTH];
        if !slot.iter().all(u8::is_ascii_digit) {
            return Err(FerryError::InvalidScdName {
                name: name.to_owned(),
                reason: "slot field is not two decimal digits".into(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
        })
    }

    /// Whether a directory entry name is recognized as an SCD batch file.
    ///
    /// Recognition requires a parseable layout plus a `.scd` extension
    /// (case-insensitive); the relocator itself only needs the layout.
    #[must_use]
    pub fn is_recognized(name: &str) -> bool {
        if Self::parse(name).is_err() {
            return false;
        }
        let lower = name.to_ascii_lowercase();
        lower.len() > SLOT_OFFSET + SLOT_WIDTH && lower.ends_with(".scd")
    }

    /// The full file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The 2-character type code.
    #[must_use]
    pub fn type_code(&self) -> &str {
        &self.name[..SLOT_OFFSET]
    }

    /// The slot value, in `[0, 99]`.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // validated at parse time
    pub fn slot(&self) -> u8 {
        self.name[SLOT_OFFSET..SLOT_OFFSET + SLOT_WIDTH]
            .parse()
            .expect("slot validated at parse time")
    }

    /// The free-form remainder after the slot field.
    #[must_use]
    pub fn remainder(&self) -> &str {
        &self.name[SLOT_OFFSET + SLOT_WIDTH..]
    }

    /// The same name with the slot incremented by one.
    ///
    /// Returns `None` at slot 99: the valid range stops there and relocation
    /// treats exhaustion as a hard batch failure rather than wrapping.
    #[must_use]
    pub fn with_next_slot(&self) -> Option<Self> {
        let slot = self.slot();
        if slot >= MAX_SLOT {
            return None;
        }
        let name = format!("{}{:02}{}", self.type_code(), slot + 1, self.remainder());
        Some(Self { name })
    }
}

impl fmt::Display for ScdFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<Path> for ScdFileName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.name)
    }
}

// ─── Ingest channel ─────────────────────────────────────────────────────────

/// Which notification channel an ingest coordinator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestChannel {
    /// Ordinary incremental batches.
    Incremental,
    /// Full-snapshot data staged for an index rebuild.
    RebuildSnapshot,
}

impl IngestChannel {
    /// Whether this channel stages data for rebuilds.
    #[must_use]
    pub const fn is_rebuild(self) -> bool {
        matches!(self, Self::RebuildSnapshot)
    }

    /// The write action dispatched for data arriving on this channel.
    #[must_use]
    pub const fn write_action(self) -> WriteAction {
        match self {
            Self::Incremental => WriteAction::Index,
            Self::RebuildSnapshot => WriteAction::RebuildFromScd,
        }
    }
}

impl fmt::Display for IngestChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => f.write_str("incremental"),
            Self::RebuildSnapshot => f.write_str("rebuild_snapshot"),
        }
    }
}

// ─── Write command ──────────────────────────────────────────────────────────

/// Action carried by a [`WriteCommand`] toward the primary's write queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    /// Incremental index of newly staged SCD data.
    Index,
    /// Full rebuild from staged snapshot SCD data.
    RebuildFromScd,
}

impl WriteAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::RebuildFromScd => "rebuild_from_scd",
        }
    }

    /// Controller routing segment for the action.
    #[must_use]
    pub const fn controller(self) -> &'static str {
        match self {
            Self::Index => "commands",
            Self::RebuildFromScd => "collection",
        }
    }

    /// Full request URI (`controller/action`).
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Index => "commands/index",
            Self::RebuildFromScd => "collection/rebuild_from_scd",
        }
    }
}

/// A structured index/rebuild request bound for the primary's write queue.
///
/// Created only on the primary node of a distributed deployment, handed to the
/// external queue, and not retained locally afterward. Authorization is
/// enforced upstream, so `acl_tokens` is always empty on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    /// Target collection.
    pub collection: String,
    /// SCD path the consumer should index from; empty when the consumer must
    /// resolve its own known staging location.
    pub index_scd_path: String,
    /// Requested action.
    pub action: WriteAction,
}

impl WriteCommand {
    /// Build a command for the given collection, path, and action.
    #[must_use]
    pub fn new(collection: impl Into<String>, scd_path: Option<&Path>, action: WriteAction) -> Self {
        Self {
            collection: collection.into(),
            index_scd_path: scd_path
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            action,
        }
    }

    /// Serialize into the queue wire shape:
    /// `{collection, index_scd_path, header: {acl_tokens, action, controller}, uri}`.
    #[must_use]
    pub fn wire_value(&self) -> serde_json::Value {
        serde_json::json!({
            "collection": self.collection,
            "index_scd_path": self.index_scd_path,
            "header": {
                "acl_tokens": "",
                "action": self.action.as_str(),
                "controller": self.action.controller(),
            },
            "uri": self.action.uri(),
        })
    }
}

impl fmt::Display for WriteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_value())
    }
}

// ─── Collection layout ──────────────────────────────────────────────────────

/// On-disk layout of a collection's workspace.
///
/// The live index lives at `data_path/current_dir`; during the swap step of a
/// rebuild a transient sibling `current_dir-backup` exists next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionLayout {
    /// Root of the collection workspace (removed wholesale for shadow builds).
    pub base_path: PathBuf,
    /// Parent directory of the live index directory.
    pub data_path: PathBuf,
    /// Name of the live index directory under `data_path`.
    pub current_dir: String,
}

impl CollectionLayout {
    /// The live collection's canonical directory.
    #[must_use]
    pub fn live_dir(&self) -> PathBuf {
        self.data_path.join(&self.current_dir)
    }

    /// The transient backup directory used mid-swap.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.data_path.join(format!("{}-backup", self.current_dir))
    }
}

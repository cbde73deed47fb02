//! Pipeline configuration.
//!
//! Plain serde structs with per-field defaults, loaded from JSON. Subscribers,
//! cluster transports, and collection schemas are configured elsewhere; this
//! covers only the knobs the ingest/rebuild pipeline itself owns.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FerryError, FerryResult};
use crate::types::IngestChannel;

/// Global pipeline knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FerryConfig {
    /// Name of the operational log file inside a live collection directory,
    /// preserved across rebuilds via explicit copy.
    #[serde(default = "default_scd_log_name")]
    pub scd_log_name: String,
    /// Suffix appended to a collection name to derive its shadow twin.
    #[serde(default = "default_rebuild_suffix")]
    pub rebuild_suffix: String,
}

fn default_scd_log_name() -> String {
    "scdlogs".to_owned()
}

fn default_rebuild_suffix() -> String {
    "-rebuild".to_owned()
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            scd_log_name: default_scd_log_name(),
            rebuild_suffix: default_rebuild_suffix(),
        }
    }
}

impl FerryConfig {
    /// Load from a JSON file and validate.
    ///
    /// # Errors
    ///
    /// Returns `Io` for read failures, `InvalidConfig` for parse or
    /// validation failures.
    pub fn load(path: &Path) -> FerryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| FerryError::InvalidConfig {
                field: "ferry_config".into(),
                value: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for empty values or embedded path separators.
    pub fn validate(&self) -> FerryResult<()> {
        require_plain_name("scd_log_name", &self.scd_log_name)?;
        if self.rebuild_suffix.is_empty() {
            return Err(FerryError::InvalidConfig {
                field: "rebuild_suffix".into(),
                value: String::new(),
                reason: "must not be empty; the shadow collection needs a distinct name".into(),
            });
        }
        require_no_separator("rebuild_suffix", &self.rebuild_suffix)?;
        Ok(())
    }

    /// Name of the shadow collection built during a rebuild.
    #[must_use]
    pub fn shadow_name(&self, collection: &str) -> String {
        format!("{collection}{}", self.rebuild_suffix)
    }
}

/// Binding of one ingest coordinator to a collection and channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Collection this receiver serves.
    pub collection: String,
    /// Notification channel to subscribe to.
    #[serde(default = "default_channel")]
    pub channel: IngestChannel,
}

const fn default_channel() -> IngestChannel {
    IngestChannel::Incremental
}

impl ReceiverConfig {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty or path-like collection name.
    pub fn validate(&self) -> FerryResult<()> {
        require_plain_name("collection", &self.collection)
    }
}

fn require_plain_name(field: &str, value: &str) -> FerryResult<()> {
    if value.is_empty() {
        return Err(FerryError::InvalidConfig {
            field: field.into(),
            value: String::new(),
            reason: "must not be empty".into(),
        });
    }
    require_no_separator(field, value)
}

fn require_no_separator(field: &str, value: &str) -> FerryResult<()> {
    if value.contains('/') || value.contains('\\') {
        return Err(FerryError::InvalidConfig {
            field: field.into(),
            value: value.into(),
            reason: "must not contain path separators".into(),
        });
    }
    Ok(())
}

#![forbid(unsafe_code)]
//! Identifier configuration loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ids::{IdLayout, DEFAULT_PARTITION_BITS, MAX_PARTITION_BITS};
use crate::types::{IdError, Result};

/// Settings shared by the codec, transactions and traversal roots.
///
/// ```toml
/// partition_bits = 5
/// hide_invisible = true
/// temporary_id_start = -1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdConfig {
    /// Width of the partition field in persisted ids.
    pub partition_bits: u8,
    /// Traversal roots skip elements carrying the invisibility flag.
    pub hide_invisible: bool,
    /// First temporary id handed out by a transaction; counts down from here.
    pub temporary_id_start: i64,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            partition_bits: DEFAULT_PARTITION_BITS,
            hide_invisible: true,
            temporary_id_start: -1,
        }
    }
}

impl IdConfig {
    /// Unpartitioned deployment; every id routes to partition zero.
    pub fn single_partition() -> Self {
        Self {
            partition_bits: 0,
            ..Self::default()
        }
    }

    /// 1024 partitions for large clusters.
    pub fn wide() -> Self {
        Self {
            partition_bits: 10,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: IdConfig =
            toml::from_str(text).map_err(|err| IdError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), partition_bits = config.partition_bits, "config.load");
        Ok(config)
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| IdError::Config(err.to_string()))
    }

    /// Checks field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.partition_bits > MAX_PARTITION_BITS {
            return Err(IdError::Config(format!(
                "partition_bits {} exceeds maximum {MAX_PARTITION_BITS}",
                self.partition_bits
            )));
        }
        if self.temporary_id_start >= 0 {
            return Err(IdError::Config(format!(
                "temporary_id_start must be negative, got {}",
                self.temporary_id_start
            )));
        }
        Ok(())
    }

    /// Codec layout implied by this configuration.
    pub fn layout(&self) -> Result<IdLayout> {
        IdLayout::new(self.partition_bits)
    }
}

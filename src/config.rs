//! Load configuration
//!
//! Everything a pass needs is carried in one [`LoadConfig`] value and threaded
//! through explicitly. It can be read from a JSON file; the CLI layers flag and
//! environment overrides on top.

use crate::error::{MeltError, Result};
use crate::types::MeltConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How to reach the destination store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Destination database (a SQLite file path or `file:` URI)
    pub endpoint: String,

    /// Extra databases attached by schema name on every connection
    pub attach: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Destination schema holding every target table
    pub schema_name: String,

    /// Table receiving the document's top-level fields
    pub root_table: String,

    /// Source document location
    pub source_path: String,

    pub connection: ConnectionConfig,

    pub melt: MeltConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            schema_name: String::from("main"),
            root_table: String::from("Entity"),
            source_path: String::new(),
            connection: ConnectionConfig::default(),
            melt: MeltConfig::default(),
        }
    }
}

impl LoadConfig {
    /// Read a JSON configuration file; absent keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MeltError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| MeltError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject configurations a pass cannot run with
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("schema_name", &self.schema_name),
            ("root_table", &self.root_table),
            ("source_path", &self.source_path),
            ("connection.endpoint", &self.connection.endpoint),
            ("melt.fallback_table", &self.melt.fallback_table),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(MeltError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.melt.separator.is_empty() {
            return Err(MeltError::Config("melt.separator must not be empty".into()));
        }
        Ok(())
    }
}

//! Run configuration, layered from a JSON file, the environment and CLI flags.

use crate::error::{MigrateError, Result};
use crate::load::MAX_BIND_PARAMS;
use crate::record::fields_of;
use crate::table::PROCESSING_ORDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_SCHEMA_NAME: &str = "content";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// SQLite database file to read from.
    pub source_path: PathBuf,
    /// Postgres connection string for the target.
    pub target_dsn: String,
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_schema_name() -> String {
    DEFAULT_SCHEMA_NAME.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Any subset of the configuration. Later layers override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub source_path: Option<PathBuf>,
    pub target_dsn: Option<String>,
    pub schema_name: Option<String>,
    pub batch_size: Option<usize>,
}

impl PartialConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn merge(self, overrides: PartialConfig) -> PartialConfig {
        PartialConfig {
            source_path: overrides.source_path.or(self.source_path),
            target_dsn: overrides.target_dsn.or(self.target_dsn),
            schema_name: overrides.schema_name.or(self.schema_name),
            batch_size: overrides.batch_size.or(self.batch_size),
        }
    }
}

impl MigrateConfig {
    /// Fills defaults, then validates.
    pub fn resolve(partial: PartialConfig) -> Result<Self> {
        let config = MigrateConfig {
            source_path: partial
                .source_path
                .ok_or_else(|| MigrateError::Config("source_path is required".into()))?,
            target_dsn: partial
                .target_dsn
                .ok_or_else(|| MigrateError::Config("target_dsn is required".into()))?,
            schema_name: partial.schema_name.unwrap_or_else(default_schema_name),
            batch_size: partial.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        };
        config.validate()?;
        Ok(config)
    }

    /// Largest batch whose widest insert stays under the bind-parameter limit.
    pub fn max_batch_size() -> usize {
        let widest = PROCESSING_ORDER
            .iter()
            .map(|kind| fields_of(*kind).len())
            .max()
            .unwrap_or(1);
        MAX_BIND_PARAMS / widest
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(MigrateError::Config("source_path is required".into()));
        }
        if self.target_dsn.trim().is_empty() {
            return Err(MigrateError::Config("target_dsn is required".into()));
        }
        if !is_identifier(&self.schema_name) {
            return Err(MigrateError::Config(format!(
                "schema_name must be a plain identifier, got '{}'",
                self.schema_name
            )));
        }
        let max = Self::max_batch_size();
        if self.batch_size == 0 || self.batch_size > max {
            return Err(MigrateError::Config(format!(
                "batch_size must be between 1 and {}, got {}",
                max, self.batch_size
            )));
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

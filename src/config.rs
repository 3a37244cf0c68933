use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How long handles stay valid inside a fragment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HandleRetention {
    /// The handle table is cleared at every query boundary.
    #[default]
    PerQuery,
    /// Handles live until the fragment is dropped.
    Retain,
}

/// Per-fragment execution settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    pub handle_retention: HandleRetention,
    /// Capacity of the executor's command queue.
    pub queue_depth: usize,
    /// zstd level used when exporting bitmaps.
    pub compression_level: i32,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        FragmentConfig {
            handle_retention: HandleRetention::PerQuery,
            queue_depth: 1024,
            compression_level: 3,
        }
    }
}

impl FragmentConfig {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {:?}: {}", path, e)))?;
        let cfg: FragmentConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {:?}: {}", path, e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(Error::Config("queue_depth must be at least 1".into()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression_level {} outside 1..=22",
                self.compression_level
            )));
        }
        Ok(())
    }
}

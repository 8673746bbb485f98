use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::error::{GfsError, GfsResult};

/// Cluster configuration. Missing fields in a config file take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfsConfig {
    /// Size of the fixed chunkserver pool.
    pub num_chunkservers: usize,
    /// Maximum bytes per chunk.
    pub chunk_size: usize,
    /// Each chunkserver stores under `<storage_root>/<index>`.
    pub storage_root: PathBuf,
    /// Payloads kept in each chunkserver's read cache.
    pub chunk_cache_capacity: usize,
}

impl Default for GfsConfig {
    fn default() -> Self {
        GfsConfig {
            num_chunkservers: 5,
            chunk_size: 10,
            storage_root: PathBuf::from("/tmp/gfs/chunks"),
            chunk_cache_capacity: 20,
        }
    }
}

impl GfsConfig {
    pub fn from_json_str(json: &str) -> GfsResult<GfsConfig> {
        let config: GfsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> GfsResult<GfsConfig> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| GfsError::io(path, e))?;
        let config = GfsConfig::from_json_str(&json)?;
        info!(path = %path.display(), ?config, "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> GfsResult<()> {
        if self.num_chunkservers == 0 {
            return Err(GfsError::InvalidConfig("num_chunkservers must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(GfsError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.chunk_cache_capacity == 0 {
            return Err(GfsError::InvalidConfig("chunk_cache_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn chunkserver_dir(&self, index: usize) -> PathBuf {
        self.storage_root.join(index.to_string())
    }
}

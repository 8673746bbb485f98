use std::path::PathBuf;
use thiserror::Error;

use crate::common::ChunkHandle;

pub type GfsResult<T> = Result<T, GfsError>;

#[derive(Debug, Error)]
pub enum GfsError {
    /// A file name with no entry in the master's file table.
    #[error("file does not exist: {name}")]
    FileNotFound { name: String },

    /// A chunk id unknown to the master, or never stored on a chunkserver.
    #[error("chunk not found: {chunk}")]
    ChunkNotFound { chunk: ChunkHandle },

    /// Append requires the file to exist already.
    #[error("append error, file does not exist: {name}")]
    AppendTargetMissing { name: String },

    #[error("no chunkserver with index {index} in the pool")]
    ChunkserverNotFound { index: usize },

    #[error("{name}: split into {expected} chunks but master allocated {allocated}")]
    ChunkCountMismatch {
        name: String,
        expected: usize,
        allocated: usize,
    },

    #[error("chunk {chunk} failed checksum: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        chunk: ChunkHandle,
        expected: u32,
        actual: u32,
    },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Config, snapshot or chunk metadata (de)serialization.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

impl GfsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GfsError::Io { path: path.into(), source }
    }
}

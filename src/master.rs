use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::ops::Bound;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, instrument};

use crate::common::{lock, ChunkHandle, ChunkserverHandle};
use crate::error::{GfsError, GfsResult};

pub mod file;

/// Client-facing API of the master. Every call is one request/response
/// exchange, so a networked master can stand in for `MasterServer`.
pub trait MasterProcess {
    /// Maximum bytes per chunk.
    fn chunk_size(&self) -> NonZeroUsize;
    /// Allocate chunks for a new (or replaced) file.
    fn allocate(&mut self, name: &str, num_chunks: usize) -> GfsResult<Vec<ChunkHandle>>;
    /// Allocate chunks onto the end of an existing file, returning only the new ones.
    fn allocate_append(&mut self, name: &str, num_chunks: usize) -> GfsResult<Vec<ChunkHandle>>;
    /// The index of the chunkserver holding a chunk.
    fn locate(&self, chunk: ChunkHandle) -> GfsResult<usize>;
    /// The ordered chunks of a file.
    fn chunk_ids_for(&self, name: &str) -> GfsResult<Vec<ChunkHandle>>;
    fn exists(&self, name: &str) -> bool;
    /// Soft delete: rename the file into the deleted namespace. Returns the new name.
    fn delete(&mut self, name: &str) -> GfsResult<String>;
    fn server_pool(&self) -> BTreeMap<usize, ChunkserverHandle>;
}

pub struct MasterServer {
    /// File name to ordered chunk list. Sorted, so prefix listing is a range scan.
    file_table: BTreeMap<String, Vec<ChunkHandle>>,

    /// Chunk to chunkserver index. Written once per chunk.
    chunk_locations: HashMap<ChunkHandle, usize>,

    /// Fixed pool of chunkservers, keyed by index.
    chunkservers: BTreeMap<usize, ChunkserverHandle>,

    /// Round-robin cursor, shared by all files.
    chunk_robin: usize,

    chunk_size: NonZeroUsize,
}

/// Serializable view of the master's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub chunk_size: usize,
    pub num_chunkservers: usize,
    pub chunk_robin: usize,
    pub files: BTreeMap<String, Vec<ChunkHandle>>,
    pub chunk_locations: BTreeMap<ChunkHandle, usize>,
}

impl MetadataSnapshot {
    pub fn to_json(&self) -> GfsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl MasterServer {
    /// Build a master over a fixed pool. Chunkserver `i` of the vector must
    /// report index `i`.
    pub fn new(chunk_size: usize, chunkservers: Vec<ChunkserverHandle>) -> GfsResult<MasterServer> {
        let chunk_size = NonZeroUsize::new(chunk_size)
            .ok_or_else(|| GfsError::InvalidConfig("chunk_size must be at least 1".into()))?;

        for (slot, chunkserver) in chunkservers.iter().enumerate() {
            let index = lock(chunkserver, "chunkserver")?.index();
            if index != slot {
                return Err(GfsError::InvalidConfig(format!(
                    "chunkserver in pool slot {slot} reports index {index}"
                )));
            }
        }

        Ok(MasterServer {
            file_table: BTreeMap::new(),
            chunk_locations: HashMap::new(),
            chunkservers: chunkservers.into_iter().enumerate().collect(),
            chunk_robin: 0,
            chunk_size,
        })
    }

    fn allocate_chunks(&mut self, num_chunks: usize) -> GfsResult<Vec<ChunkHandle>> {
        if num_chunks > 0 && self.chunkservers.is_empty() {
            return Err(GfsError::InvalidConfig("master has no chunkservers".into()));
        }
        let mut chunks = Vec::with_capacity(num_chunks);
        for _ in 0..num_chunks {
            let chunk = ChunkHandle::generate();
            self.chunk_locations.insert(chunk, self.chunk_robin);
            debug!(%chunk, chunkserver = self.chunk_robin, "Placed chunk");
            chunks.push(chunk);
            self.chunk_robin = (self.chunk_robin + 1) % self.chunkservers.len();
        }
        Ok(chunks)
    }

    /// The current round-robin cursor.
    pub fn chunk_robin(&self) -> usize {
        self.chunk_robin
    }

    /// List every file name (live or deleted) starting with `prefix`, sorted.
    pub fn ls(&self, prefix: &str) -> Vec<String> {
        self.file_table
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(name, _)| name)
            .take_while(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// List soft-deleted entries awaiting garbage collection.
    pub fn ls_deleted(&self) -> Vec<String> {
        self.ls(file::DELETED_PREFIX)
    }

    pub fn snapshot(&self) -> MetadataSnapshot {
        MetadataSnapshot {
            chunk_size: self.chunk_size.get(),
            num_chunkservers: self.chunkservers.len(),
            chunk_robin: self.chunk_robin,
            files: self.file_table.clone(),
            chunk_locations: self.chunk_locations.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

impl MasterProcess for MasterServer {
    fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    #[instrument(name = "master_allocate", skip(self))]
    fn allocate(&mut self, name: &str, num_chunks: usize) -> GfsResult<Vec<ChunkHandle>> {
        let chunks = self.allocate_chunks(num_chunks)?;
        self.file_table.insert(name.to_string(), chunks.clone());
        Ok(chunks)
    }

    #[instrument(name = "master_allocate_append", skip(self))]
    fn allocate_append(&mut self, name: &str, num_chunks: usize) -> GfsResult<Vec<ChunkHandle>> {
        if !self.file_table.contains_key(name) {
            return Err(GfsError::FileNotFound { name: name.to_string() });
        }
        let appended = self.allocate_chunks(num_chunks)?;
        if let Some(chunks) = self.file_table.get_mut(name) {
            chunks.extend_from_slice(&appended);
        }
        Ok(appended)
    }

    fn locate(&self, chunk: ChunkHandle) -> GfsResult<usize> {
        self.chunk_locations
            .get(&chunk)
            .copied()
            .ok_or(GfsError::ChunkNotFound { chunk })
    }

    fn chunk_ids_for(&self, name: &str) -> GfsResult<Vec<ChunkHandle>> {
        self.file_table
            .get(name)
            .cloned()
            .ok_or_else(|| GfsError::FileNotFound { name: name.to_string() })
    }

    fn exists(&self, name: &str) -> bool {
        self.file_table.contains_key(name)
    }

    #[instrument(name = "master_delete", skip(self))]
    fn delete(&mut self, name: &str) -> GfsResult<String> {
        let chunks = self
            .file_table
            .remove(name)
            .ok_or_else(|| GfsError::FileNotFound { name: name.to_string() })?;

        // Same-instant deletes of one name collide; the later rename wins.
        let deleted = file::deleted_name(name, chrono::Utc::now());
        info!(file = %name, renamed = %deleted, "Deleted file, ready for gc");
        self.file_table.insert(deleted.clone(), chunks);
        Ok(deleted)
    }

    fn server_pool(&self) -> BTreeMap<usize, ChunkserverHandle> {
        self.chunkservers.clone()
    }
}

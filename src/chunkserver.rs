use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use lru::LruCache;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, instrument, warn};

use crate::common::ChunkHandle;
use crate::error::{GfsError, GfsResult};

/// Client-facing API of a chunkserver. Knows nothing about files or other
/// chunkservers.
pub trait ChunkserverProcess {
    /// This server's index in the master's pool.
    fn index(&self) -> usize;
    /// Persist a chunk payload. Storing the same id twice overwrites it.
    fn store(&mut self, chunk: ChunkHandle, data: &[u8]) -> GfsResult<()>;
    /// Fetch the exact bytes stored under `chunk`.
    fn retrieve(&mut self, chunk: ChunkHandle) -> GfsResult<Vec<u8>>;
}

/// A chunk held on local disk. Length and checksum are recorded at write
/// time in a `.meta` file next to the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(skip)]
    pub path: PathBuf,
    pub len: u64,
    pub checksum: u32,
}

const CHUNK_FILE_PREFIX: &str = "ch";
const CHUNK_META_SUFFIX: &str = ".meta";

pub struct ChunkserverStorage {
    // The path to the chunkserver storage directory.
    storage_dir: PathBuf,

    // Index of chunks on disk.
    chunks: HashMap<ChunkHandle, Chunk>,
}

impl ChunkserverStorage {
    /// Open a storage directory, creating it if needed and indexing any
    /// chunks a previous process left in it.
    pub fn open(storage_dir: impl Into<PathBuf>) -> GfsResult<ChunkserverStorage> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir).map_err(|e| GfsError::io(&storage_dir, e))?;

        let mut chunks = HashMap::new();
        let files = std::fs::read_dir(&storage_dir).map_err(|e| GfsError::io(&storage_dir, e))?;
        for file in files {
            let file = file.map_err(|e| GfsError::io(&storage_dir, e))?;
            let name = file.file_name();
            let Some(name) = name.to_str() else {
                warn!(file = ?name, "Skipping unrecognised file in chunk storage");
                continue;
            };
            if name.ends_with(CHUNK_META_SUFFIX) {
                continue;
            }
            let Some(handle) = name.strip_prefix(CHUNK_FILE_PREFIX).and_then(ChunkHandle::parse) else {
                warn!(file = %name, "Skipping unrecognised file in chunk storage");
                continue;
            };

            let path = file.path();
            let chunk = match read_chunk_meta(&meta_path(&path)) {
                Ok(meta) => Chunk { path, ..meta },
                Err(e) => {
                    warn!(%handle, error = %e, "Skipping chunk without readable metadata");
                    continue;
                }
            };
            debug!(%handle, checksum = chunk.checksum, "Found chunk");
            chunks.insert(handle, chunk);
        }

        info!(dir = %storage_dir.display(), chunks = chunks.len(), "Opened chunk storage");
        Ok(ChunkserverStorage { storage_dir, chunks })
    }

    fn chunk_path(&self, handle: ChunkHandle) -> PathBuf {
        self.storage_dir.join(format!("{CHUNK_FILE_PREFIX}{handle}"))
    }

    pub fn write_chunk(&mut self, handle: ChunkHandle, data: &[u8]) -> GfsResult<()> {
        let path = self.chunk_path(handle);
        std::fs::write(&path, data).map_err(|e| GfsError::io(&path, e))?;

        let chunk = Chunk { path, len: data.len() as u64, checksum: crc32fast::hash(data) };
        let meta = meta_path(&chunk.path);
        std::fs::write(&meta, serde_json::to_vec(&chunk)?).map_err(|e| GfsError::io(&meta, e))?;

        self.chunks.insert(handle, chunk);
        Ok(())
    }

    pub fn read_chunk(&self, handle: ChunkHandle) -> GfsResult<Vec<u8>> {
        let chunk = self.chunks.get(&handle).ok_or(GfsError::ChunkNotFound { chunk: handle })?;
        let data = std::fs::read(&chunk.path).map_err(|e| GfsError::io(&chunk.path, e))?;

        let actual = crc32fast::hash(&data);
        if data.len() as u64 != chunk.len || actual != chunk.checksum {
            return Err(GfsError::ChecksumMismatch { chunk: handle, expected: chunk.checksum, actual });
        }
        Ok(data)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn stored_bytes(&self) -> u64 {
        self.chunks.values().map(|c| c.len).sum()
    }
}

fn meta_path(chunk_path: &Path) -> PathBuf {
    let mut name = chunk_path.as_os_str().to_owned();
    name.push(CHUNK_META_SUFFIX);
    PathBuf::from(name)
}

fn read_chunk_meta(path: &Path) -> GfsResult<Chunk> {
    let json = std::fs::read(path).map_err(|e| GfsError::io(path, e))?;
    Ok(serde_json::from_slice(&json)?)
}

pub struct Chunkserver {
    index: usize,

    /// The LRU cache for recently stored and read chunks.
    lru_cache: LruCache<ChunkHandle, Vec<u8>>,

    /// The storage for the chunkserver.
    storage: ChunkserverStorage,
}

impl Chunkserver {
    pub fn new(index: usize, cache_capacity: NonZeroUsize, storage: ChunkserverStorage) -> Chunkserver {
        Chunkserver {
            index,
            lru_cache: LruCache::new(cache_capacity),
            storage,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.storage.chunk_count()
    }

    pub fn stored_bytes(&self) -> u64 {
        self.storage.stored_bytes()
    }
}

impl ChunkserverProcess for Chunkserver {
    fn index(&self) -> usize {
        self.index
    }

    #[instrument(name = "chunkserver_store", skip(self, data), fields(index = self.index, len = data.len()))]
    fn store(&mut self, chunk: ChunkHandle, data: &[u8]) -> GfsResult<()> {
        self.storage.write_chunk(chunk, data)?;
        self.lru_cache.put(chunk, data.to_vec());
        debug!("Stored chunk");
        Ok(())
    }

    #[instrument(name = "chunkserver_retrieve", skip(self), fields(index = self.index))]
    fn retrieve(&mut self, chunk: ChunkHandle) -> GfsResult<Vec<u8>> {
        if let Some(data) = self.lru_cache.get(&chunk) {
            return Ok(data.clone());
        }

        let data = self.storage.read_chunk(chunk)?;
        self.lru_cache.put(chunk, data.clone());
        Ok(data)
    }
}

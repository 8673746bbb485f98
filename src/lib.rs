use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use byte_unit::Byte;
use tracing::info;

pub mod chunk;
pub mod chunkserver;
pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod logger;
pub mod master;

pub use crate::chunkserver::{Chunkserver, ChunkserverProcess, ChunkserverStorage};
pub use crate::client::Client;
pub use crate::common::{ChunkHandle, ChunkserverHandle};
pub use crate::config::GfsConfig;
pub use crate::error::{GfsError, GfsResult};
pub use crate::master::{MasterProcess, MasterServer, MetadataSnapshot};

use crate::common::lock;

/// A master and its chunkserver pool, wired up in one process.
pub struct Cluster {
    master: Arc<Mutex<MasterServer>>,
}

impl Cluster {
    /// Create the chunkservers (storage under `<storage_root>/<index>`) and a
    /// master over them.
    pub fn from_config(config: &GfsConfig) -> GfsResult<Cluster> {
        config.validate()?;
        let cache_capacity = NonZeroUsize::new(config.chunk_cache_capacity)
            .ok_or_else(|| GfsError::InvalidConfig("chunk_cache_capacity must be at least 1".into()))?;

        let mut chunkservers: Vec<ChunkserverHandle> = Vec::with_capacity(config.num_chunkservers);
        for i in 0..config.num_chunkservers {
            let storage = ChunkserverStorage::open(config.chunkserver_dir(i))?;
            chunkservers.push(Arc::new(Mutex::new(Chunkserver::new(i, cache_capacity, storage))));
        }

        info!(
            chunkservers = config.num_chunkservers,
            chunk_size = config.chunk_size,
            root = %config.storage_root.display(),
            "Created cluster"
        );
        let master = MasterServer::new(config.chunk_size, chunkservers)?;
        Ok(Cluster { master: Arc::new(Mutex::new(master)) })
    }

    pub fn master(&self) -> Arc<Mutex<MasterServer>> {
        self.master.clone()
    }

    pub fn client(&self) -> Client {
        Client::new(self.master.clone())
    }

    /// Log the file table, then every chunk with its server and size.
    pub fn dump_metadata(&self) -> GfsResult<MetadataSnapshot> {
        let (snapshot, chunkservers) = {
            let master = lock(&self.master, "master")?;
            (master.snapshot(), master.server_pool())
        };

        for (name, chunks) in &snapshot.files {
            info!(file = %name, chunks = chunks.len(), "File");
        }
        info!(chunkservers = snapshot.num_chunkservers, "Chunkservers");

        let mut placements: Vec<_> = snapshot.chunk_locations.iter().collect();
        placements.sort_by_key(|(_, index)| **index);

        let mut total = 0u64;
        for (chunk, index) in placements {
            let chunkserver = chunkservers
                .get(index)
                .ok_or(GfsError::ChunkserverNotFound { index: *index })?;
            let data = lock(chunkserver, "chunkserver")?.retrieve(*chunk)?;
            total += data.len() as u64;
            info!(chunkserver = index, %chunk, data = %String::from_utf8_lossy(&data), "Chunk");
        }
        info!(total = %format!("{:#}", Byte::from_u64(total)), "Chunk data");

        Ok(snapshot)
    }
}

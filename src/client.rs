use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use crate::chunk::{data_to_chunks, num_chunks};
use crate::common::{lock, ChunkHandle, ChunkserverHandle};
use crate::error::{GfsError, GfsResult};
use crate::master::{MasterProcess, MasterServer};

/// Splits files into chunks, asks the master where they go, and moves the
/// data to and from chunkservers directly.
pub struct Client<M: MasterProcess = MasterServer> {
    master: Arc<Mutex<M>>,
}

impl<M: MasterProcess> Clone for Client<M> {
    fn clone(&self) -> Self {
        Client { master: self.master.clone() }
    }
}

impl<M: MasterProcess> Client<M> {
    pub fn new(master: Arc<Mutex<M>>) -> Client<M> {
        Client { master }
    }

    fn master(&self) -> GfsResult<std::sync::MutexGuard<'_, M>> {
        lock(&self.master, "master")
    }

    /// Write a file, replacing (and soft deleting) any existing one.
    #[instrument(name = "client_write", skip(self, data), fields(len = data.len()))]
    pub fn write(&self, path: &str, data: &[u8]) -> GfsResult<()> {
        if self.exists(path)? {
            self.delete(path)?;
        }

        let chunks = {
            let mut master = self.master()?;
            let count = num_chunks(data.len(), master.chunk_size());
            master.allocate(path, count)?
        };
        info!(chunks = chunks.len(), "Writing file");
        self.write_chunks(path, &chunks, data)
    }

    /// Append to an existing file.
    #[instrument(name = "client_write_append", skip(self, data), fields(len = data.len()))]
    pub fn write_append(&self, path: &str, data: &[u8]) -> GfsResult<()> {
        if !self.exists(path)? {
            return Err(GfsError::AppendTargetMissing { name: path.to_string() });
        }

        let chunks = {
            let mut master = self.master()?;
            let count = num_chunks(data.len(), master.chunk_size());
            master.allocate_append(path, count)?
        };
        info!(chunks = chunks.len(), "Appending to file");
        self.write_chunks(path, &chunks, data)
    }

    fn write_chunks(&self, path: &str, chunks: &[ChunkHandle], data: &[u8]) -> GfsResult<()> {
        let (slices, chunkservers) = {
            let master = self.master()?;
            (data_to_chunks(data, master.chunk_size()), master.server_pool())
        };
        if slices.len() != chunks.len() {
            return Err(GfsError::ChunkCountMismatch {
                name: path.to_string(),
                expected: slices.len(),
                allocated: chunks.len(),
            });
        }

        // Slice i goes to chunk i.
        for (chunk, slice) in chunks.iter().zip(slices) {
            let chunkserver = self.chunkserver_for(&chunkservers, *chunk)?;
            lock(&chunkserver, "chunkserver")?.store(*chunk, slice)?;
        }
        Ok(())
    }

    fn chunkserver_for(
        &self,
        chunkservers: &BTreeMap<usize, ChunkserverHandle>,
        chunk: ChunkHandle,
    ) -> GfsResult<ChunkserverHandle> {
        let index = self.master()?.locate(chunk)?;
        debug!(%chunk, index, "Located chunk");
        chunkservers
            .get(&index)
            .cloned()
            .ok_or(GfsError::ChunkserverNotFound { index })
    }

    /// Read a whole file, reassembling its chunks in order.
    #[instrument(name = "client_read", skip(self))]
    pub fn read(&self, path: &str) -> GfsResult<Vec<u8>> {
        if !self.exists(path)? {
            return Err(GfsError::FileNotFound { name: path.to_string() });
        }

        let (chunks, chunkservers) = {
            let master = self.master()?;
            (master.chunk_ids_for(path)?, master.server_pool())
        };

        let mut data = vec![];
        for chunk in chunks {
            let chunkserver = self.chunkserver_for(&chunkservers, chunk)?;
            let payload = lock(&chunkserver, "chunkserver")?.retrieve(chunk)?;
            data.extend_from_slice(&payload);
        }
        Ok(data)
    }

    pub fn exists(&self, path: &str) -> GfsResult<bool> {
        Ok(self.master()?.exists(path))
    }

    /// Soft delete through the master. Chunk data is left in place.
    pub fn delete(&self, path: &str) -> GfsResult<()> {
        self.master()?.delete(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use crate::chunkserver::{Chunkserver, ChunkserverStorage};
    use crate::master::file;

    struct Fixture {
        _dir: tempfile::TempDir,
        master: Arc<Mutex<MasterServer>>,
        client: Client,
    }

    fn fixture(num_chunkservers: usize, chunk_size: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pool = (0..num_chunkservers)
            .map(|i| {
                let storage = ChunkserverStorage::open(dir.path().join(i.to_string())).unwrap();
                let cs = Chunkserver::new(i, NonZeroUsize::new(4).unwrap(), storage);
                Arc::new(Mutex::new(cs)) as ChunkserverHandle
            })
            .collect();
        let master = Arc::new(Mutex::new(MasterServer::new(chunk_size, pool).unwrap()));
        let client = Client::new(master.clone());
        Fixture { _dir: dir, master, client }
    }

    const README: &[u8] = b"This file tells you all about python.";

    #[test]
    fn write_then_read_round_trips() {
        let f = fixture(5, 10);
        f.client.write("/usr/python/readme.txt", README).unwrap();

        assert!(f.client.exists("/usr/python/readme.txt").unwrap());
        let chunks = f.master.lock().unwrap().chunk_ids_for("/usr/python/readme.txt").unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(f.client.read("/usr/python/readme.txt").unwrap(), README);
    }

    #[test]
    fn last_chunk_holds_remainder() {
        let f = fixture(5, 10);
        f.client.write("/f", README).unwrap();

        let master = f.master.lock().unwrap();
        let chunks = master.chunk_ids_for("/f").unwrap();
        let last = chunks[3];
        let server = master.server_pool()[&master.locate(last).unwrap()].clone();
        assert_eq!(server.lock().unwrap().retrieve(last).unwrap(), b"python.");
    }

    #[test]
    fn append_concatenates() {
        let f = fixture(3, 10);
        f.client.write("/f", README).unwrap();
        f.client.write_append("/f", b"I'm a little sentence that just snuck in at the end.\n").unwrap();

        let mut expected = README.to_vec();
        expected.extend_from_slice(b"I'm a little sentence that just snuck in at the end.\n");
        assert_eq!(f.client.read("/f").unwrap(), expected);
    }

    #[test]
    fn append_to_missing_file_fails_without_allocating() {
        let f = fixture(3, 10);
        match f.client.write_append("/missing", b"foo") {
            Err(GfsError::AppendTargetMissing { name }) => assert_eq!(name, "/missing"),
            other => panic!("expected AppendTargetMissing, got {other:?}"),
        }
        let master = f.master.lock().unwrap();
        assert_eq!(master.chunk_robin(), 0);
        assert!(!master.exists("/missing"));
    }

    #[test]
    fn overwrite_replaces_content_and_soft_deletes_old() {
        let f = fixture(3, 4);
        f.client.write("/f", b"first version").unwrap();
        let old = f.master.lock().unwrap().chunk_ids_for("/f").unwrap();

        f.client.write("/f", b"second").unwrap();
        assert_eq!(f.client.read("/f").unwrap(), b"second");

        let master = f.master.lock().unwrap();
        let live = master.chunk_ids_for("/f").unwrap();
        assert!(old.iter().all(|c| !live.contains(c)));

        let deleted = master.ls_deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(master.chunk_ids_for(&deleted[0]).unwrap(), old);
    }

    #[test]
    fn delete_hides_file_but_keeps_chunks() {
        let f = fixture(2, 10);
        f.client.write("/f", README).unwrap();
        f.client.delete("/f").unwrap();

        assert!(!f.client.exists("/f").unwrap());
        assert!(matches!(f.client.read("/f"), Err(GfsError::FileNotFound { .. })));
        assert!(matches!(f.client.delete("/f"), Err(GfsError::FileNotFound { .. })));

        let deleted = f.master.lock().unwrap().ls_deleted().remove(0);
        assert!(file::is_deleted(&deleted));
        assert_eq!(f.client.read(&deleted).unwrap(), README);
    }

    #[test]
    fn one_byte_chunks_round_trip() {
        let f = fixture(3, 1);
        f.client.write("/f", b"abcde").unwrap();
        assert_eq!(f.master.lock().unwrap().chunk_ids_for("/f").unwrap().len(), 5);
        assert_eq!(f.client.read("/f").unwrap(), b"abcde");
    }

    #[test]
    fn zero_chunk_size_master_cannot_back_a_client() {
        let f = fixture(2, 10);
        let pool = f.master.lock().unwrap().server_pool().into_values().collect();
        assert!(matches!(MasterServer::new(0, pool), Err(GfsError::InvalidConfig(_))));
    }

    #[test]
    fn empty_file_round_trips() {
        let f = fixture(2, 10);
        f.client.write("/empty", b"").unwrap();
        assert!(f.client.exists("/empty").unwrap());
        assert!(f.client.read("/empty").unwrap().is_empty());

        f.client.write_append("/empty", b"").unwrap();
        assert_eq!(f.master.lock().unwrap().chunk_robin(), 0);
    }

    /// Master that hands out one chunk fewer than asked for.
    struct ShortMaster(MasterServer);

    impl MasterProcess for ShortMaster {
        fn chunk_size(&self) -> NonZeroUsize {
            self.0.chunk_size()
        }

        fn allocate(&mut self, name: &str, n: usize) -> GfsResult<Vec<ChunkHandle>> {
            self.0.allocate(name, n.saturating_sub(1))
        }

        fn allocate_append(&mut self, name: &str, n: usize) -> GfsResult<Vec<ChunkHandle>> {
            self.0.allocate_append(name, n)
        }

        fn locate(&self, chunk: ChunkHandle) -> GfsResult<usize> {
            self.0.locate(chunk)
        }

        fn chunk_ids_for(&self, name: &str) -> GfsResult<Vec<ChunkHandle>> {
            self.0.chunk_ids_for(name)
        }

        fn exists(&self, name: &str) -> bool {
            self.0.exists(name)
        }

        fn delete(&mut self, name: &str) -> GfsResult<String> {
            self.0.delete(name)
        }

        fn server_pool(&self) -> BTreeMap<usize, ChunkserverHandle> {
            self.0.server_pool()
        }
    }

    #[test]
    fn mismatched_allocation_is_rejected() {
        let f = fixture(2, 10);
        let pool = f.master.lock().unwrap().server_pool().into_values().collect();
        let client = Client::new(Arc::new(Mutex::new(ShortMaster(MasterServer::new(10, pool).unwrap()))));

        assert!(matches!(
            client.write("/f", README),
            Err(GfsError::ChunkCountMismatch { expected: 4, allocated: 3, .. })
        ));
    }
}

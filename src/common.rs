use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::chunkserver::ChunkserverProcess;
use crate::error::{GfsError, GfsResult};

/// Identifier of a chunk. Generated once by the master at allocation time
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkHandle(Uuid);

impl ChunkHandle {
    pub fn generate() -> ChunkHandle {
        ChunkHandle(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<ChunkHandle> {
        Uuid::parse_str(s).ok().map(ChunkHandle)
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handle to a chunkserver, as handed out by the master's server pool.
pub type ChunkserverHandle = Arc<Mutex<dyn ChunkserverProcess + Send>>;

/// Lock a shared component, turning poisoning into an error.
pub fn lock<'a, T: ?Sized>(mutex: &'a Mutex<T>, what: &'static str) -> GfsResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| GfsError::LockPoisoned(what))
}

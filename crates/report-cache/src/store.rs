//! Artifact store
use report_core::{CacheKey, CachedArtifact};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Where published artifacts live. Readers get whole `Arc`s, so a reader
/// never sees an artifact that is still being built.
pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedArtifact>>;

    /// Replace whatever is stored under `key`.
    fn put(&self, key: CacheKey, artifact: Arc<CachedArtifact>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, Arc<CachedArtifact>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedArtifact>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: CacheKey, artifact: Arc<CachedArtifact>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, artifact);
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

//! The backing storage layer is abstracted (§4.3): RAM-only for tests and
//! small deployments, or file-backed in a content-addressed layout under a
//! cache root for production.

use super::key::CacheKey;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;

pub trait BlockStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;
    fn put(&self, key: &CacheKey, bytes: Vec<u8>);
    fn remove(&self, key: &CacheKey);
}

#[derive(Default)]
pub struct MemoryStore {
    data: parking_lot::RwLock<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    fn put(&self, key: &CacheKey, bytes: Vec<u8>) {
        self.data.write().insert(*key, bytes);
    }

    fn remove(&self, key: &CacheKey) {
        self.data.write().remove(key);
    }
}

/// Content-addressed on-disk layout: `{root}/{file_id}/{file_version}/{block_id}.{block_version}`.
pub struct FileBackedStore {
    root: PathBuf,
}

impl FileBackedStore {
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(FileBackedStore { root })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.file_id.to_string())
            .join(key.file_version.to_string())
            .join(format!("{}.{}", key.block_id, key.block_version))
    }
}

impl BlockStore for FileBackedStore {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        let mut f = std::fs::File::open(path).ok()?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).ok()?;
        Some(buf)
    }

    fn put(&self, key: &CacheKey, bytes: Vec<u8>) {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut f) = std::fs::File::create(&path) {
            let _ = f.write_all(&bytes);
        }
    }

    fn remove(&self, key: &CacheKey) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

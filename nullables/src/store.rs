//! Nullable fork-aware store — thread-safe in-memory storage for testing.

use meridian_store::{ForkState, StoreError};
use meridian_types::BlockHash;
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory fork-aware store.
///
/// Blocks are registered with their parent via [`NullForkState::add_block`];
/// reads walk the ancestry until the key is found, mirroring how the real
/// state layer resolves fork-scoped keys. A `None` entry is a tombstone left
/// by `delete`, shadowing any ancestor value.
pub struct NullForkState {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    parents: HashMap<[u8; 32], BlockHash>,
    data: HashMap<[u8; 32], HashMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl NullForkState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a block under its parent so reads resolve through ancestry.
    /// Genesis blocks pass `None`.
    pub fn add_block(&self, hash: BlockHash, parent: Option<BlockHash>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(parent) = parent {
            inner.parents.insert(*hash.as_bytes(), parent);
        }
        inner.data.entry(*hash.as_bytes()).or_default();
    }
}

impl Default for NullForkState {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkState for NullForkState {
    fn get(&self, block_hash: &BlockHash, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut current = Some(*block_hash);
        while let Some(hash) = current {
            if let Some(layer) = inner.data.get(hash.as_bytes()) {
                if let Some(entry) = layer.get(key) {
                    return Ok(entry.clone());
                }
            }
            current = inner.parents.get(hash.as_bytes()).copied();
        }
        Ok(None)
    }

    fn put(&self, block_hash: &BlockHash, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .data
            .entry(*block_hash.as_bytes())
            .or_default()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, block_hash: &BlockHash, key: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .data
            .entry(*block_hash.as_bytes())
            .or_default()
            .insert(key.to_vec(), None);
        Ok(())
    }
}

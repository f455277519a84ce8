//! Abstract fork-aware storage for the Meridian protocol.
//!
//! The consensus host owns a block-scoped, transactional world-state; this
//! crate defines the narrow interface other subsystems read and write it
//! through. Every key is scoped by the block hash it was written under, and
//! reads resolve through the block's ancestry, so stored values follow the
//! chain's fork semantics: a reorg changes the canonical block hash and with
//! it the visible state.

pub mod error;

pub use error::StoreError;

use meridian_types::BlockHash;

/// A fork-aware key/value store.
///
/// Writes land under the given block hash and become visible to that block
/// and its descendants. All writes made while processing one block commit
/// atomically with that block. Readers may call concurrently from unrelated
/// threads; implementations must provide a consistent snapshot per block
/// hash.
pub trait ForkState: Send + Sync {
    /// Read a key as visible at `block_hash`, resolving through ancestors.
    fn get(&self, block_hash: &BlockHash, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a key under `block_hash`.
    fn put(&self, block_hash: &BlockHash, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key as visible at `block_hash`. Ancestor blocks keep their
    /// own view of the key.
    fn delete(&self, block_hash: &BlockHash, key: &[u8]) -> Result<(), StoreError>;
}

impl<T: ForkState + ?Sized> ForkState for std::sync::Arc<T> {
    fn get(&self, block_hash: &BlockHash, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(block_hash, key)
    }

    fn put(&self, block_hash: &BlockHash, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(block_hash, key, value)
    }

    fn delete(&self, block_hash: &BlockHash, key: &[u8]) -> Result<(), StoreError> {
        (**self).delete(block_hash, key)
    }
}

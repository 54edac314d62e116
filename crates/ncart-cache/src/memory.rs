//! In-memory cartridge cache.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::CacheError;
use crate::{CacheEntry, CacheKey, CacheMetadata, CartridgeCache};

/// Cartridge cache held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCartridgeCache {
    entries: RwLock<BTreeMap<CacheKey, (Vec<u8>, CacheMetadata)>>,
}

impl MemoryCartridgeCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Replace the bytes of an existing entry. Test hook for simulating a
    /// corrupted store.
    pub fn overwrite(&self, key: &CacheKey, bytes: Vec<u8>) -> bool {
        match self.entries.write().get_mut(key) {
            Some(slot) => {
                slot.0 = bytes;
                true
            }
            None => false,
        }
    }
}

impl CartridgeCache for MemoryCartridgeCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.read().get(key).map(|(b, _)| b.clone()))
    }

    fn put(&self, key: &CacheKey, bytes: &[u8], metadata: &CacheMetadata) -> Result<(), CacheError> {
        self.entries
            .write()
            .entry(*key)
            .or_insert_with(|| (bytes.to_vec(), metadata.clone()));
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn clear_all(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write();
        let n = entries.len();
        entries.clear();
        Ok(n)
    }

    fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, (_, meta))| CacheEntry {
                key: *key,
                metadata: Some(meta.clone()),
            })
            .collect())
    }
}

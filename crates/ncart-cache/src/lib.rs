//! # ncart-cache: Reconstructed Cartridge Cache
//!
//! Verified cartridge bytes are kept under a [`CacheKey`] of
//! `(cartridge_id, sha256)`. A key is written at most once per successful
//! verification, so stores never need read-modify-write.
//!
//! The cache does not verify on read. Callers re-check the digest of a hit
//! and purge it on mismatch.
//!
//! Handles are constructed explicitly and passed in; there is no global
//! instance. [`FsCartridgeCache`] has an open/close lifecycle,
//! [`MemoryCartridgeCache`] lives as long as its owner.

pub mod error;
pub mod fs;
pub mod memory;

pub use error::CacheError;
pub use fs::FsCartridgeCache;
pub use memory::MemoryCartridgeCache;

use chrono::{DateTime, Utc};
use ncart_core::ContentDigest;
use serde::{Deserialize, Serialize};

/// Cache key: one verified reconstruction of one cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Cartridge id from the header.
    pub cartridge_id: u32,
    /// Digest of the cartridge bytes.
    pub digest: ContentDigest,
}

impl CacheKey {
    /// Build a key.
    pub fn new(cartridge_id: u32, digest: ContentDigest) -> Self {
        Self {
            cartridge_id,
            digest,
        }
    }

    /// Stable file stem: `{cartridge_id}_{sha256 hex}`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.cartridge_id, self.digest.to_hex())
    }

    /// Parse a file stem produced by [`CacheKey::file_stem`].
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (id, hex) = stem.split_once('_')?;
        Some(Self {
            cartridge_id: id.parse().ok()?,
            digest: ContentDigest::from_hex(hex).ok()?,
        })
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// Descriptive data stored alongside cached bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Human label, usually the catalog title or source address.
    #[serde(default)]
    pub name: Option<String>,
    /// Byte length of the cached cartridge.
    pub total_size: u64,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

impl CacheMetadata {
    /// Metadata stamped with the current time.
    pub fn now(name: Option<String>, total_size: u64) -> Self {
        Self {
            name,
            total_size,
            stored_at: Utc::now(),
        }
    }
}

/// One listed cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Entry key.
    pub key: CacheKey,
    /// Entry metadata, when readable.
    pub metadata: Option<CacheMetadata>,
}

/// Keyed get/put/delete store for verified cartridges.
pub trait CartridgeCache: Send + Sync {
    /// Bytes stored under `key`, if any.
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store bytes under `key`. Storing an existing key is a no-op.
    fn put(&self, key: &CacheKey, bytes: &[u8], metadata: &CacheMetadata) -> Result<(), CacheError>;

    /// Remove `key`. Returns whether anything was removed.
    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Remove every entry. Returns the number of entries removed.
    fn clear_all(&self) -> Result<usize, CacheError>;

    /// Every entry, sorted by key.
    fn list(&self) -> Result<Vec<CacheEntry>, CacheError>;
}

impl<T: CartridgeCache + ?Sized> CartridgeCache for std::sync::Arc<T> {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key)
    }

    fn put(&self, key: &CacheKey, bytes: &[u8], metadata: &CacheMetadata) -> Result<(), CacheError> {
        (**self).put(key, bytes, metadata)
    }

    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        (**self).delete(key)
    }

    fn clear_all(&self) -> Result<usize, CacheError> {
        (**self).clear_all()
    }

    fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        (**self).list()
    }
}

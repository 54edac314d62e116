//! # Filesystem Cartridge Cache
//!
//! Entries live flat under the cache root:
//!
//! ```text
//! {root}/{cartridge_id}_{sha256}.bin    cartridge bytes
//! {root}/{cartridge_id}_{sha256}.json   CacheMetadata
//! ```
//!
//! ## Lifecycle
//!
//! [`FsCartridgeCache::open`] creates the root and returns a handle.
//! [`FsCartridgeCache::close`] marks the handle closed; every later call
//! fails with [`CacheError::Closed`]. Two handles on different roots never
//! interfere, so tests can run sync sessions side by side.
//!
//! ## Writes
//!
//! Files are written to a temporary file in the cache root and renamed into
//! place, so a reader never sees a partial entry. The data file is renamed
//! last and without replacing an existing one; its presence marks a
//! complete entry.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;

use crate::error::CacheError;
use crate::{CacheEntry, CacheKey, CacheMetadata, CartridgeCache};

const DATA_EXT: &str = "bin";
const META_EXT: &str = "json";

/// Cartridge cache backed by a directory.
#[derive(Debug)]
pub struct FsCartridgeCache {
    root: PathBuf,
    closed: AtomicBool,
}

impl FsCartridgeCache {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened cartridge cache");
        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    /// Close the handle. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(root = %self.root.display(), "closed cartridge cache");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Root directory of this cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the data file for `key`.
    pub fn data_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{DATA_EXT}", key.file_stem()))
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{META_EXT}", key.file_stem()))
    }

    /// `bytes` in a flushed temporary file under the root, ready to rename.
    fn staged(&self, bytes: &[u8]) -> Result<NamedTempFile, CacheError> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.is_closed() {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

fn remove_if_present(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl CartridgeCache for FsCartridgeCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_open()?;
        match fs::read(self.data_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &CacheKey, bytes: &[u8], metadata: &CacheMetadata) -> Result<(), CacheError> {
        self.ensure_open()?;
        let data_path = self.data_path(key);
        // An existing entry for the key holds the same verified bytes.
        if data_path.exists() {
            tracing::debug!(key = %key, "cache entry already present");
            return Ok(());
        }

        let meta = self.staged(&serde_json::to_vec_pretty(metadata)?)?;
        meta.persist(self.meta_path(key)).map_err(|e| e.error)?;

        match self.staged(bytes)?.persist_noclobber(&data_path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(key = %key, "cache entry written concurrently");
                Ok(())
            }
            Err(e) => Err(e.error.into()),
        }
    }

    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.ensure_open()?;
        let removed = remove_if_present(&self.data_path(key))?;
        remove_if_present(&self.meta_path(key))?;
        Ok(removed)
    }

    fn clear_all(&self) -> Result<usize, CacheError> {
        self.ensure_open()?;
        let mut removed = 0;
        for entry in self.list()? {
            if self.delete(&entry.key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.ensure_open()?;
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATA_EXT) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(CacheKey::from_file_stem)
            else {
                continue;
            };
            let metadata = fs::read(self.meta_path(&key))
                .ok()
                .and_then(|raw| serde_json::from_slice(&raw).ok());
            entries.push(CacheEntry { key, metadata });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

impl Drop for FsCartridgeCache {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncart_core::sha256_digest;

    fn key_for(id: u32, bytes: &[u8]) -> CacheKey {
        CacheKey::new(id, sha256_digest(bytes))
    }

    #[test]
    fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let key = key_for(7, b"rom bytes");

        assert!(cache.get(&key).unwrap().is_none());
        cache
            .put(&key, b"rom bytes", &CacheMetadata::now(Some("Doom".into()), 9))
            .unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap(), b"rom bytes".to_vec());

        let listed = cache.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, key);
        assert_eq!(listed[0].metadata.as_ref().unwrap().name.as_deref(), Some("Doom"));
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let key = key_for(1, b"a");
        let meta = CacheMetadata::now(None, 1);
        cache.put(&key, b"a", &meta).unwrap();
        cache.put(&key, b"a", &meta).unwrap();
        assert_eq!(cache.list().unwrap().len(), 1);
    }

    #[test]
    fn delete_and_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let meta = CacheMetadata::now(None, 1);
        let k1 = key_for(1, b"a");
        let k2 = key_for(2, b"b");
        let k3 = key_for(3, b"c");
        for (k, b) in [(k1, b"a"), (k2, b"b"), (k3, b"c")] {
            cache.put(&k, b, &meta).unwrap();
        }

        assert!(cache.delete(&k1).unwrap());
        assert!(!cache.delete(&k1).unwrap());
        assert!(!cache.meta_path(&k1).exists());

        fs::write(dir.path().join("notes.txt"), b"unrelated").unwrap();
        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(cache.list().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn closed_handle_rejects_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        cache.close();
        cache.close();
        assert!(cache.is_closed());
        let key = key_for(1, b"a");
        assert!(matches!(cache.get(&key), Err(CacheError::Closed)));
        assert!(matches!(cache.clear_all(), Err(CacheError::Closed)));
    }

    #[test]
    fn separate_roots_do_not_interfere() {
        let d1 = tempfile::tempdir().unwrap();
        let d2 = tempfile::tempdir().unwrap();
        let c1 = FsCartridgeCache::open(d1.path()).unwrap();
        let c2 = FsCartridgeCache::open(d2.path().join("nested/cache")).unwrap();
        let key = key_for(1, b"a");
        c1.put(&key, b"a", &CacheMetadata::now(None, 1)).unwrap();
        assert!(c2.get(&key).unwrap().is_none());
        c1.close();
        assert!(c2.list().unwrap().is_empty());
    }

    #[test]
    fn put_leaves_only_entry_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let key = key_for(2, b"rom");
        cache.put(&key, b"rom", &CacheMetadata::now(None, 1)).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let stem = key.file_stem();
        assert_eq!(names, vec![format!("{stem}.bin"), format!("{stem}.json")]);
    }

    #[test]
    fn interrupted_write_does_not_block_a_later_put() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let key = key_for(3, b"full cartridge");
        // What a crash between write and rename leaves behind.
        fs::write(dir.path().join(".tmpAbC123"), b"full car").unwrap();
        assert!(cache.list().unwrap().is_empty());
        assert!(cache.get(&key).unwrap().is_none());

        cache
            .put(&key, b"full cartridge", &CacheMetadata::now(None, 1))
            .unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap(), b"full cartridge".to_vec());
        assert_eq!(cache.list().unwrap().len(), 1);
    }

    #[test]
    fn missing_metadata_still_lists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let key = key_for(5, b"x");
        cache.put(&key, b"x", &CacheMetadata::now(None, 1)).unwrap();
        fs::remove_file(cache.meta_path(&key)).unwrap();
        let listed = cache.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].metadata.is_none());
    }
}

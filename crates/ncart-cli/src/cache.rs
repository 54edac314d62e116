//! # Cache Subcommand
//!
//! Lists and clears the on-disk cartridge cache that `ncart sync` fills.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ncart_cache::{CacheKey, CartridgeCache, FsCartridgeCache};
use ncart_core::ContentDigest;

use crate::node::parse_id;

/// Location of the cartridge cache.
#[derive(Args, Debug, Clone)]
pub struct CacheDirArgs {
    /// Cache directory.
    #[arg(long, env = "NCART_CACHE_DIR", default_value = ".ncart/cache")]
    pub cache_dir: PathBuf,
}

impl CacheDirArgs {
    /// Open the cache, creating the directory if needed.
    pub fn open(&self) -> Result<FsCartridgeCache> {
        FsCartridgeCache::open(&self.cache_dir)
            .with_context(|| format!("failed to open cache at {}", self.cache_dir.display()))
    }
}

/// Arguments for `ncart cache`.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(flatten)]
    pub dir: CacheDirArgs,

    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// List cached cartridges.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Remove one cached cartridge.
    Remove {
        /// Cartridge id.
        #[arg(long, value_parser = parse_id)]
        cartridge_id: u32,
        /// SHA-256 of the cartridge, hex.
        #[arg(long)]
        sha256: String,
    },

    /// Remove every cached cartridge.
    Clear,
}

/// Execute the cache subcommand.
pub fn run_cache(args: &CacheArgs) -> Result<u8> {
    let cache = args.dir.open()?;
    match &args.command {
        CacheCommand::List { json } => cmd_list(&cache, *json),
        CacheCommand::Remove {
            cartridge_id,
            sha256,
        } => {
            let digest = ContentDigest::from_hex(sha256)
                .with_context(|| format!("invalid --sha256: {sha256:?}"))?;
            let key = CacheKey::new(*cartridge_id, digest);
            if cache.delete(&key)? {
                println!("OK: removed {key}");
                Ok(0)
            } else {
                println!("Not cached: {key}");
                Ok(1)
            }
        }
        CacheCommand::Clear => {
            let removed = cache.clear_all()?;
            println!("OK: removed {removed} cached cartridges");
            Ok(0)
        }
    }
}

fn cmd_list(cache: &FsCartridgeCache, json: bool) -> Result<u8> {
    let entries = cache.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }
    if entries.is_empty() {
        println!("No cached cartridges in {}.", cache.root().display());
        return Ok(0);
    }
    println!("Cached cartridges ({}):", entries.len());
    for entry in &entries {
        match &entry.metadata {
            Some(meta) => println!(
                "  {}  {} bytes  {}  {}",
                entry.key,
                meta.total_size,
                meta.stored_at.format("%Y-%m-%d %H:%M:%S"),
                meta.name.as_deref().unwrap_or("-")
            ),
            None => println!("  {}  (no metadata)", entry.key),
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncart_cache::CacheMetadata;
    use ncart_core::sha256_digest;

    fn args(dir: &std::path::Path, command: CacheCommand) -> CacheArgs {
        CacheArgs {
            dir: CacheDirArgs {
                cache_dir: dir.to_path_buf(),
            },
            command,
        }
    }

    #[test]
    fn remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCartridgeCache::open(dir.path()).unwrap();
        let a = CacheKey::new(1, sha256_digest(b"a"));
        let b = CacheKey::new(2, sha256_digest(b"b"));
        cache.put(&a, b"a", &CacheMetadata::now(None, 1)).unwrap();
        cache.put(&b, b"b", &CacheMetadata::now(None, 1)).unwrap();

        let remove = CacheCommand::Remove {
            cartridge_id: 1,
            sha256: a.digest.to_hex(),
        };
        assert_eq!(run_cache(&args(dir.path(), remove)).unwrap(), 0);
        assert!(cache.get(&a).unwrap().is_none());

        let again = CacheCommand::Remove {
            cartridge_id: 1,
            sha256: a.digest.to_hex(),
        };
        assert_eq!(run_cache(&args(dir.path(), again)).unwrap(), 1);

        assert_eq!(run_cache(&args(dir.path(), CacheCommand::Clear)).unwrap(), 0);
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn bad_digest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let remove = CacheCommand::Remove {
            cartridge_id: 1,
            sha256: "zz".into(),
        };
        assert!(run_cache(&args(dir.path(), remove)).is_err());
    }
}

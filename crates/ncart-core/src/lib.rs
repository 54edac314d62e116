//! # ncart-core: Cartridge Transport Primitives
//!
//! Leaf crate of the workspace. It knows nothing about networks or disks;
//! it defines how a file becomes ledger payloads and how payloads become a
//! verified file again.
//!
//! - [`identity`]: 20-byte ledger identities and their checksummed string form.
//! - [`record`]: the fixed 64-byte `CART`, `DATA` and `CENT` records.
//! - [`chunk`]: splitting, first-seen-wins collection, reassembly.
//! - [`digest`]: SHA-256 content digests and hex helpers.
//! - [`error`]: the structured error hierarchy.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ncart-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

#![deny(missing_docs)]

pub mod chunk;
pub mod digest;
pub mod error;
pub mod identity;
pub mod record;

pub use chunk::{reassemble, reassemble_verified, split, verify, ChunkMap, ChunkPlan, Chunks};
pub use digest::{from_hex, sha256_digest, to_hex, ContentDigest};
pub use error::{CartError, CodecError, FormatError, IntegrityError, ReassemblyError};
pub use identity::{normalize_address, ChecksumPolicy, Identity, ADDRESS_PREFIX};
pub use record::{
    parse_u32_field, truncate_title, CartridgeHeader, CatalogEntry, DataChunk,
    Platform, Record, Semver, DATA_CAPACITY, DEFAULT_CHUNK_SIZE, PAYLOAD_SIZE, SCHEMA_VERSION,
    TITLE_MAX_BYTES,
};

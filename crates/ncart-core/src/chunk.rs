//! # Chunking and Reassembly
//!
//! [`split`] turns a byte blob into `ceil(len / chunk_size)` ordered chunks.
//! [`reassemble`] goes the other way from an index-keyed [`ChunkMap`], and
//! never guesses: a missing index is [`ReassemblyError::IncompleteData`]
//! with found/expected counts, a length disagreement is
//! [`ReassemblyError::SizeMismatch`].
//!
//! Integrity is a separate step ([`verify`]) so that a caller holding bytes
//! from a cache can re-check them without a chunk map.

use std::collections::BTreeMap;

use crate::digest::{sha256_digest, ContentDigest};
use crate::error::{CartError, IntegrityError, ReassemblyError};

/// Chunk geometry of one cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Length of the original file.
    pub total_size: u64,
    /// Bytes per chunk.
    pub chunk_size: usize,
}

impl ChunkPlan {
    /// Describe a file of `total_size` bytes cut into `chunk_size` pieces.
    pub fn new(total_size: u64, chunk_size: usize) -> Self {
        Self {
            total_size,
            chunk_size,
        }
    }

    /// `ceil(total_size / chunk_size)`.
    pub fn expected_chunks(&self) -> Result<usize, ReassemblyError> {
        if self.total_size == 0 {
            return Ok(0);
        }
        if self.chunk_size == 0 {
            return Err(ReassemblyError::ZeroChunkSize);
        }
        let n = self.total_size.div_ceil(self.chunk_size as u64);
        usize::try_from(n).map_err(|_| ReassemblyError::SizeMismatch {
            expected: self.total_size,
            actual: 0,
        })
    }

    /// Length of the chunk at `index`, or `None` when out of range.
    pub fn chunk_len(&self, index: usize) -> Option<usize> {
        let n = self.expected_chunks().ok()?;
        if index >= n {
            return None;
        }
        if index + 1 < n {
            return Some(self.chunk_size);
        }
        let before = (n as u64 - 1) * self.chunk_size as u64;
        usize::try_from(self.total_size - before).ok()
    }
}

/// Lazy chunk sequence over a borrowed blob. Cloning restarts it.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    chunk_size: usize,
    next: u32,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        let take = self.chunk_size.min(self.data.len());
        let (head, tail) = self.data.split_at(take);
        self.data = tail;
        let index = self.next;
        self.next = self.next.wrapping_add(1);
        Some((index, head))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.data.len().div_ceil(self.chunk_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Split `bytes` into ordered `(index, chunk)` pairs.
pub fn split(bytes: &[u8], chunk_size: usize) -> Result<Chunks<'_>, ReassemblyError> {
    if chunk_size == 0 {
        return Err(ReassemblyError::ZeroChunkSize);
    }
    Ok(Chunks {
        data: bytes,
        chunk_size,
        next: 0,
    })
}

/// Index-keyed chunk collection where the first insert for an index wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkMap {
    chunks: BTreeMap<u32, Vec<u8>>,
}

impl ChunkMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk. Returns `false` and keeps the existing bytes when the
    /// index is already present.
    pub fn insert(&mut self, index: u32, bytes: Vec<u8>) -> bool {
        match self.chunks.entry(index) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(bytes);
                true
            }
        }
    }

    /// Number of distinct indices.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is present.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether `index` is present.
    pub fn contains(&self, index: u32) -> bool {
        self.chunks.contains_key(&index)
    }

    /// The first `limit` indices in `0..expected` that are absent, ascending.
    ///
    /// Walks the gaps between held indices, so the cost follows
    /// `len() + limit` rather than `expected`.
    pub fn missing(&self, expected: usize, limit: usize) -> Vec<u32> {
        let end = u64::try_from(expected).unwrap_or(u64::MAX);
        let mut out = Vec::new();
        let mut next = 0u64;
        for &held in self.chunks.keys() {
            let held = u64::from(held);
            if held >= end || out.len() >= limit {
                break;
            }
            fill_gap(&mut out, next, held, limit);
            next = held + 1;
        }
        fill_gap(&mut out, next, end, limit);
        out
    }
}

/// Push `from..to` onto `out` until it holds `limit` entries.
fn fill_gap(out: &mut Vec<u32>, from: u64, to: u64, limit: usize) {
    let room = limit.saturating_sub(out.len()) as u64;
    let to = to.min(from.saturating_add(room)).min(u64::from(u32::MAX) + 1);
    out.extend((from..to).filter_map(|i| u32::try_from(i).ok()));
}

impl FromIterator<(u32, Vec<u8>)> for ChunkMap {
    fn from_iter<I: IntoIterator<Item = (u32, Vec<u8>)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (index, bytes) in iter {
            map.insert(index, bytes);
        }
        map
    }
}

/// Concatenate a complete chunk set in index order.
pub fn reassemble(chunks: &ChunkMap, plan: &ChunkPlan) -> Result<Vec<u8>, ReassemblyError> {
    let expected = plan.expected_chunks()?;
    if let Some(&index) = chunks.chunks.keys().find(|&&i| i as usize >= expected) {
        return Err(ReassemblyError::UnexpectedIndex { index, expected });
    }
    let found = chunks.len();
    if found < expected {
        return Err(ReassemblyError::IncompleteData { found, expected });
    }

    let mut out = Vec::with_capacity(usize::try_from(plan.total_size).unwrap_or(0));
    for bytes in chunks.chunks.values() {
        out.extend_from_slice(bytes);
    }
    if out.len() as u64 != plan.total_size {
        return Err(ReassemblyError::SizeMismatch {
            expected: plan.total_size,
            actual: out.len() as u64,
        });
    }
    Ok(out)
}

/// Check assembled bytes against the declared digest.
///
/// On mismatch the bytes are returned inside the error.
pub fn verify(bytes: Vec<u8>, expected: &ContentDigest) -> Result<Vec<u8>, IntegrityError> {
    let actual = sha256_digest(&bytes);
    if &actual == expected {
        Ok(bytes)
    } else {
        Err(IntegrityError {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
            bytes,
        })
    }
}

/// [`reassemble`] followed by [`verify`].
pub fn reassemble_verified(
    chunks: &ChunkMap,
    plan: &ChunkPlan,
    expected: &ContentDigest,
) -> Result<Vec<u8>, CartError> {
    let bytes = reassemble(chunks, plan)?;
    Ok(verify(bytes, expected)?)
}

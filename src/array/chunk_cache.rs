//! The mutable state of an array: block cache, current block, shard write cache and chunk presence.
//!
//! All of it lives in one [`ArrayState`] guarded by a single mutex of the array.
//! Writers reach it through `&mut Array` without locking.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::ArrayIndices;

/// A decoded block (inner chunk) in native layout.
///
/// [`None`] if the backing value is missing, in which case the block reads as the fill value.
pub(crate) type Block = Option<Vec<u8>>;

/// The block the array last read or is writing.
#[derive(Debug)]
pub(crate) struct CurrentBlock {
    pub(crate) chunk_indices: ArrayIndices,
    pub(crate) block: Block,
    /// Holds modifications that have not been flushed.
    pub(crate) dirty: bool,
}

/// A decoded shard awaiting write-back, with a bitmap of the inner chunks written since it was loaded.
#[derive(Debug)]
pub(crate) struct ShardWriteEntry {
    pub(crate) bytes: Vec<u8>,
    written: Vec<u64>,
    num_written: usize,
    num_chunks: usize,
}

impl ShardWriteEntry {
    pub(crate) fn new(bytes: Vec<u8>, num_chunks: usize) -> Self {
        Self {
            bytes,
            written: vec![0; num_chunks.div_ceil(64)],
            num_written: 0,
            num_chunks,
        }
    }

    /// Mark the inner chunk at linear index `chunk` as written.
    pub(crate) fn mark_written(&mut self, chunk: usize) {
        let (word, bit) = (chunk / 64, 1u64 << (chunk % 64));
        if self.written[word] & bit == 0 {
            self.written[word] |= bit;
            self.num_written += 1;
        }
    }

    /// Returns true once every inner chunk has been written.
    #[must_use]
    pub(crate) fn is_complete(&self) -> bool {
        self.num_written == self.num_chunks
    }
}

/// The mutable state of an array.
#[derive(Debug, Default)]
pub(crate) struct ArrayState {
    /// Blocks populated by prefetching, keyed by inner chunk indices.
    pub(crate) blocks: HashMap<ArrayIndices, Block>,
    pub(crate) current: Option<CurrentBlock>,
    /// In-flight shards keyed by shard indices.
    pub(crate) shard_writes: BTreeMap<ArrayIndices, ShardWriteEntry>,
    /// The storage chunks (shards) known to exist, if presence is cached.
    pub(crate) presence: Option<HashSet<ArrayIndices>>,
}

impl ArrayState {
    /// Returns true if the storage chunk at `chunk_indices` is known to be absent.
    #[must_use]
    pub(crate) fn known_missing(&self, chunk_indices: &[u64]) -> bool {
        self.presence
            .as_ref()
            .is_some_and(|presence| !presence.contains(chunk_indices))
    }

    /// Record whether the storage chunk at `chunk_indices` exists.
    pub(crate) fn set_present(&mut self, chunk_indices: &[u64], present: bool) {
        if let Some(presence) = &mut self.presence {
            if present {
                presence.insert(chunk_indices.to_vec());
            } else {
                presence.remove(chunk_indices);
            }
        }
    }

    /// Returns true if the current block is `chunk_indices` and has unflushed modifications.
    #[must_use]
    pub(crate) fn is_dirty(&self, chunk_indices: &[u64]) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.dirty && current.chunk_indices == chunk_indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_write_entry_bitmap() {
        let mut entry = ShardWriteEntry::new(vec![0; 8], 70);
        assert!(!entry.is_complete());
        for chunk in (1..70).rev() {
            entry.mark_written(chunk);
            entry.mark_written(chunk);
        }
        assert!(!entry.is_complete());
        entry.mark_written(0);
        assert!(entry.is_complete());
    }

    #[test]
    fn presence() {
        let mut state = ArrayState::default();
        assert!(!state.known_missing(&[0, 0]));
        state.presence = Some(HashSet::new());
        assert!(state.known_missing(&[0, 0]));
        state.set_present(&[0, 0], true);
        assert!(!state.known_missing(&[0, 0]));
        state.set_present(&[0, 0], false);
        assert!(state.known_missing(&[0, 0]));
    }
}

use std::collections::{BTreeMap, BTreeSet};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    array_subset::ArraySubset, config::global_config,
    storage::ReadableWritableListableStorageTraits,
};

use super::{
    concurrency::{for_each_partitioned, worker_count},
    Array, ArrayError, ArrayIndices,
};

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Array<TStorage> {
    /// Prefetch the blocks intersecting `array_subset` into the block cache.
    ///
    /// Cached blocks outside of the region are evicted and cached blocks inside it are kept, so the cache holds the blocks of the most recently advised region.
    /// Subsequent reads of the region are served from the cache and return the same elements as uncached reads.
    ///
    /// For a sharded array, the blocks are grouped by shard and each shard holding more than one requested block is decoded with a single batched partial decode.
    /// If more than one shard qualifies, shards are decoded in parallel.
    /// Blocks of shards with a single requested block are read on demand.
    ///
    /// Otherwise, the blocks are partitioned across up to [`max_threads`](crate::config::Config#maximum-threads) workers.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the `array_subset` is out of bounds or any block fails to load.
    pub fn advise_read(&self, array_subset: &ArraySubset) -> Result<(), ArrayError> {
        self.validate_array_subset(array_subset)?;
        if array_subset.is_empty() {
            return Ok(());
        }
        let chunks = array_subset.chunks(&self.inner_chunk_shape.to_array_shape())?;
        let chunk_indices: Vec<ArrayIndices> = {
            let window: BTreeSet<ArrayIndices> = chunks.indices().collect();
            let mut state = self.state.lock();
            state.blocks.retain(|chunk_indices, _| window.contains(chunk_indices));
            window
                .into_iter()
                .filter(|chunk_indices| {
                    if state.blocks.contains_key(chunk_indices) {
                        return false;
                    }
                    let current = state
                        .current
                        .as_ref()
                        .is_some_and(|current| &current.chunk_indices == chunk_indices);
                    let in_flight = self.is_sharded()
                        && state
                            .shard_writes
                            .contains_key(&self.shard_indices(chunk_indices));
                    !current && !in_flight
                })
                .collect()
        };
        if self.is_sharded() {
            self.prefetch_sharded(chunk_indices)
        } else {
            self.prefetch_partitioned(&chunk_indices)
        }
    }

    fn prefetch_sharded(&self, chunk_indices: Vec<ArrayIndices>) -> Result<(), ArrayError> {
        let mut shards: BTreeMap<ArrayIndices, Vec<ArrayIndices>> = BTreeMap::new();
        for chunk_indices in chunk_indices {
            shards
                .entry(self.shard_indices(&chunk_indices))
                .or_default()
                .push(chunk_indices);
        }
        shards.retain(|_, chunks| chunks.len() > 1);
        let max_threads = global_config().max_threads();
        log::debug!(
            "prefetching {} shards of array {} ({} threads)",
            shards.len(),
            self.path,
            max_threads
        );

        let load = |codecs: &super::CodecChain,
                    shard_indices: &[u64],
                    chunks: Vec<ArrayIndices>|
         -> Result<(), ArrayError> {
            let blocks = self.load_blocks(codecs, shard_indices, &chunks)?;
            self.state.lock().blocks.extend(std::iter::zip(chunks, blocks));
            Ok(())
        };

        if shards.len() > 1 && max_threads > 1 {
            let jobs: Vec<_> = shards
                .into_iter()
                .map(|(shard_indices, chunks)| (shard_indices, chunks, self.codecs.clone()))
                .collect();
            jobs.into_par_iter()
                .try_for_each(|(shard_indices, chunks, codecs)| {
                    load(&codecs, &shard_indices, chunks)
                })
        } else {
            for (shard_indices, chunks) in shards {
                load(&self.codecs, &shard_indices, chunks)?;
            }
            Ok(())
        }
    }

    fn prefetch_partitioned(&self, chunk_indices: &[ArrayIndices]) -> Result<(), ArrayError> {
        let num_workers = worker_count(global_config().max_threads(), chunk_indices.len());
        log::debug!(
            "prefetching {} chunks of array {} with {num_workers} workers",
            chunk_indices.len(),
            self.path
        );
        let states = (0..num_workers).map(|_| self.codecs.clone()).collect();
        for_each_partitioned(chunk_indices, states, |codecs, chunk_indices| {
            let block = self.load_block(codecs, chunk_indices)?;
            self.state.lock().blocks.insert(chunk_indices.clone(), block);
            Ok(())
        })
    }
}

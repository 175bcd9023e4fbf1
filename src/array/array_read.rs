use std::collections::HashSet;

use crate::{
    array_subset::{copy_subarray, ArraySubset},
    storage::{ReadableWritableListableStorageTraits, StorageError},
};

use super::{
    chunk_cache::{Block, CurrentBlock},
    codec::{ArrayCodecTraits, ArrayToBytesCodecTraits, CodecError, StoragePartialDecoder},
    element::{array_bytes_to_elements, Element},
    Array, ArrayError, ArrayIndices, CodecChain,
};

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Array<TStorage> {
    /// List the chunks of the array in the store and cache their presence.
    ///
    /// While the cache is enabled, reads of chunks absent from the store return the fill value without touching the store.
    /// Keys under the array prefix that do not match the chunk key encoding are ignored.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be listed.
    pub fn cache_chunk_presence(&self) -> Result<(), StorageError> {
        let prefix = self.path.store_prefix()?;
        let mut presence = HashSet::new();
        for key in self.storage.list_prefix(&prefix)? {
            let Some(relative) = key.as_str().strip_prefix(prefix.as_str()) else {
                continue;
            };
            if let Some(chunk_indices) = self
                .chunk_key_encoding
                .decode(relative, self.dimensionality())
            {
                presence.insert(chunk_indices);
            }
        }
        log::debug!(
            "cached presence of {} chunks of array {}",
            presence.len(),
            self.path
        );
        self.state.lock().presence = Some(presence);
        Ok(())
    }

    /// Load the blocks at `chunk_indices` of the chunk (shard) at `shard_indices` with `codecs`.
    ///
    /// If the codecs support partial decoding, only the requested blocks are decoded, with a single read of the shard index.
    /// Otherwise the whole chunk is read and decoded once.
    pub(crate) fn load_blocks(
        &self,
        codecs: &CodecChain,
        shard_indices: &[u64],
        chunk_indices: &[ArrayIndices],
    ) -> Result<Vec<Block>, ArrayError> {
        if self.state.lock().known_missing(shard_indices) {
            return Ok(vec![None; chunk_indices.len()]);
        }
        let key = self.chunk_key(shard_indices)?;
        let chunk_representation = self.chunk_representation()?;

        if !self.is_sharded() {
            let Some(encoded) = self.storage.get(&key)? else {
                return Ok(vec![None; chunk_indices.len()]);
            };
            let decoded = codecs.decode(encoded.to_vec(), &chunk_representation)?;
            return Ok(vec![Some(decoded); chunk_indices.len()]);
        }

        let subsets = chunk_indices
            .iter()
            .map(|chunk_indices| self.shard_block_subset(chunk_indices, shard_indices))
            .collect::<Result<Vec<_>, _>>()?;
        let input = StoragePartialDecoder::new(&*self.storage, key);
        Ok(codecs
            .partial_decode(&input, &chunk_representation, &subsets)?
            .map_or_else(
                || vec![None; subsets.len()],
                |decoded| decoded.into_iter().map(Some).collect(),
            ))
    }

    /// Load the block at `chunk_indices` from the store.
    ///
    /// Returns [`None`] if the chunk holding the block is missing.
    pub(crate) fn load_block(
        &self,
        codecs: &CodecChain,
        chunk_indices: &[u64],
    ) -> Result<Block, ArrayError> {
        let shard_indices = self.shard_indices(chunk_indices);
        let mut blocks = self.load_blocks(codecs, &shard_indices, &[chunk_indices.to_vec()])?;
        Ok(blocks.pop().flatten())
    }

    /// Apply `op` to the block at `chunk_indices`.
    ///
    /// The block is resolved from the current block, the block cache, an in-flight shard, and finally the store.
    /// A block loaded from the store becomes the current block unless the current block is dirty.
    fn with_block<R>(
        &self,
        chunk_indices: &[u64],
        op: impl FnOnce(Option<&[u8]>) -> R,
    ) -> Result<R, ArrayError> {
        {
            let state = self.state.lock();
            if let Some(current) = &state.current {
                if current.chunk_indices == chunk_indices {
                    return Ok(op(current.block.as_deref()));
                }
            }
            if let Some(block) = state.blocks.get(chunk_indices) {
                return Ok(op(block.as_deref()));
            }
            if self.is_sharded() {
                let shard_indices = self.shard_indices(chunk_indices);
                if let Some(entry) = state.shard_writes.get(&shard_indices) {
                    let block = self
                        .shard_block_subset(chunk_indices, &shard_indices)?
                        .extract_bytes(
                            &entry.bytes,
                            &self.chunk_shape.to_array_shape(),
                            self.data_type.size(),
                        )
                        .map_err(CodecError::from)?;
                    return Ok(op(Some(&block)));
                }
            }
        }

        let block = self.load_block(&self.codecs, chunk_indices)?;
        let result = op(block.as_deref());
        let mut state = self.state.lock();
        if !state.current.as_ref().is_some_and(|current| current.dirty) {
            state.current = Some(CurrentBlock {
                chunk_indices: chunk_indices.to_vec(),
                block,
                dirty: false,
            });
        }
        Ok(result)
    }

    /// The subset of the block at `chunk_indices` relative to the chunk (shard) at `shard_indices`.
    pub(crate) fn shard_block_subset(
        &self,
        chunk_indices: &[u64],
        shard_indices: &[u64],
    ) -> Result<ArraySubset, ArrayError> {
        let start = itertools::izip!(
            chunk_indices,
            shard_indices,
            self.chunk_shape.iter(),
            self.inner_chunk_shape.iter()
        )
        .map(|(chunk, shard, outer, inner)| chunk * inner.get() - shard * outer.get())
        .collect();
        Ok(ArraySubset::new_with_start_shape(
            start,
            self.inner_chunk_shape.to_array_shape(),
        )?)
    }

    /// Read the block at `chunk_indices` into a new buffer, [`None`] if the block is missing.
    pub(crate) fn read_block(&self, chunk_indices: &[u64]) -> Result<Block, ArrayError> {
        self.with_block(chunk_indices, |block| block.map(<[u8]>::to_vec))
    }

    /// Read and decode the block (inner chunk) at `chunk_indices` into its bytes.
    ///
    /// A missing block reads as the fill value.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `chunk_indices` are invalid or there is a storage or codec error.
    pub fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, ArrayError> {
        self.chunk_subset(chunk_indices)?;
        Ok(self.read_block(chunk_indices)?.unwrap_or_else(|| {
            self.fill_value_or_zero()
                .repeat(self.inner_chunk_shape.num_elements_usize())
        }))
    }

    /// Read and decode the `array_subset` of the array into its bytes.
    ///
    /// Elements of missing chunks read as the fill value.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the `array_subset` is out of bounds of the array, or
    ///  - there is a storage or codec error.
    pub fn retrieve_array_subset(&self, array_subset: &ArraySubset) -> Result<Vec<u8>, ArrayError> {
        self.validate_array_subset(array_subset)?;
        let element_size = self.data_type.size();
        let mut output = self
            .fill_value_or_zero()
            .repeat(array_subset.num_elements_usize());
        if array_subset.is_empty() {
            return Ok(output);
        }
        let inner_chunk_shape = self.inner_chunk_shape.to_array_shape();
        for chunk_indices in array_subset.chunks(&inner_chunk_shape)?.indices() {
            let chunk_subset = self.chunk_subset(&chunk_indices)?;
            let overlap = array_subset.overlap(&chunk_subset)?;
            let chunk_start = overlap.relative_to(chunk_subset.start())?;
            let output_start = overlap.relative_to(array_subset.start())?;
            self.with_block(&chunk_indices, |block| {
                if let Some(block) = block {
                    copy_subarray(
                        block,
                        &inner_chunk_shape,
                        chunk_start.start(),
                        &mut output,
                        array_subset.shape(),
                        output_start.start(),
                        overlap.shape(),
                        element_size,
                    );
                }
            })?;
        }
        Ok(output)
    }

    /// Read and decode the `array_subset` of the array into a vector of its elements.
    ///
    /// Elements are converted from the data type of the array if `T` does not match it (see [`element`](crate::array::element)).
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the elements cannot be converted or there is an error retrieving the subset.
    pub fn retrieve_array_subset_elements<T: Element>(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<Vec<T>, ArrayError> {
        let bytes = self.retrieve_array_subset(array_subset)?;
        array_bytes_to_elements(&bytes, &self.data_type)
    }
}

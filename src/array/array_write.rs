use crate::{
    array_subset::{copy_subarray, ArraySubset},
    config::global_config,
    storage::ReadableWritableListableStorageTraits,
};

use super::{
    chunk_cache::{CurrentBlock, ShardWriteEntry},
    codec::ArrayCodecTraits,
    concurrency::{for_each_partitioned, worker_count},
    element::{elements_to_array_bytes, Element},
    ravel_indices, unravel_index, Array, ArrayError, ArrayIndices, CodecChain,
};

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Array<TStorage> {
    /// Encode and store the chunk (shard) at `chunk_indices` of the chunk grid with `codecs`.
    ///
    /// A chunk with every element equal to the fill value, or that encodes to nothing, is erased instead.
    fn write_encoded_chunk(
        &self,
        codecs: &CodecChain,
        chunk_indices: &[u64],
        bytes: Vec<u8>,
    ) -> Result<(), ArrayError> {
        let key = self.chunk_key(chunk_indices)?;
        let encoded = if self.fill_value_or_zero().equals_all(&bytes) {
            None
        } else {
            let encoded = codecs.encode(bytes, &self.chunk_representation()?)?;
            (!encoded.is_empty()).then_some(encoded)
        };
        if let Some(encoded) = encoded {
            self.storage.set(&key, encoded.into())?;
            self.state.lock().set_present(chunk_indices, true);
        } else {
            log::debug!("erasing sparse chunk {key}");
            self.storage.erase(&key)?;
            self.state.lock().set_present(chunk_indices, false);
        }
        Ok(())
    }

    /// Read and decode the whole chunk (shard) at `chunk_indices`, filled with the fill value if it is missing.
    fn load_chunk_for_write(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, ArrayError> {
        let fill = || {
            self.fill_value_or_zero()
                .repeat(self.chunk_shape.num_elements_usize())
        };
        if self.state.lock().known_missing(chunk_indices) {
            return Ok(fill());
        }
        match self.storage.get(&self.chunk_key(chunk_indices)?)? {
            Some(encoded) => Ok(self
                .codecs
                .decode(encoded.to_vec(), &self.chunk_representation()?)?),
            None => Ok(fill()),
        }
    }

    /// Place the block at `chunk_indices` in its in-flight shard, storing the shard once all of its blocks are written.
    fn flush_block_to_shard(&mut self, chunk_indices: &[u64], block: &[u8]) -> Result<(), ArrayError> {
        let shard_indices = self.shard_indices(chunk_indices);
        let block_subset = self.shard_block_subset(chunk_indices, &shard_indices)?;
        let chunks_per_shard: Vec<u64> = std::iter::zip(self.chunk_shape.iter(), self.inner_chunk_shape.iter())
            .map(|(outer, inner)| outer.get() / inner.get())
            .collect();
        let position: Vec<u64> = std::iter::zip(chunk_indices, &chunks_per_shard)
            .map(|(index, per_shard)| index % per_shard)
            .collect();
        #[allow(clippy::cast_possible_truncation)]
        let position = ravel_indices(&position, &chunks_per_shard) as usize;
        #[allow(clippy::cast_possible_truncation)]
        let num_chunks = chunks_per_shard.iter().product::<u64>() as usize;

        if !self.state.get_mut().shard_writes.contains_key(&shard_indices) {
            let bytes = self.load_chunk_for_write(&shard_indices)?;
            self.state
                .get_mut()
                .shard_writes
                .insert(shard_indices.clone(), ShardWriteEntry::new(bytes, num_chunks));
        }

        let shard_shape = self.chunk_shape.to_array_shape();
        let element_size = self.data_type.size();
        let state = self.state.get_mut();
        let Some(entry) = state.shard_writes.get_mut(&shard_indices) else {
            return Ok(());
        };
        block_subset.store_bytes(block, &mut entry.bytes, &shard_shape, element_size)?;
        entry.mark_written(position);
        if entry.is_complete() {
            let bytes = entry.bytes.clone();
            log::debug!(
                "storing complete shard {shard_indices:?} of array {}",
                self.path
            );
            self.write_encoded_chunk(&self.codecs, &shard_indices, bytes)?;
            self.state.get_mut().shard_writes.remove(&shard_indices);
        }
        Ok(())
    }

    /// Encode and store every in-flight shard.
    ///
    /// A shard stays in flight until it is stored, so a failed write can be retried.
    fn flush_shard_writes(&mut self) -> Result<(), ArrayError> {
        while let Some((shard_indices, bytes)) = self
            .state
            .get_mut()
            .shard_writes
            .first_key_value()
            .map(|(shard_indices, entry)| (shard_indices.clone(), entry.bytes.clone()))
        {
            log::debug!("storing shard {shard_indices:?} of array {}", self.path);
            self.write_encoded_chunk(&self.codecs, &shard_indices, bytes)?;
            self.state.get_mut().shard_writes.remove(&shard_indices);
        }
        Ok(())
    }

    /// Flush the current block if it is dirty.
    ///
    /// The block remains the current block, marked clean once it is written.
    fn flush_current(&mut self) -> Result<(), ArrayError> {
        let state = self.state.get_mut();
        if !state.current.as_ref().is_some_and(|current| current.dirty) {
            return Ok(());
        }
        let Some(current) = state.current.take() else {
            return Ok(());
        };
        let block = current.block.unwrap_or_else(|| {
            self.fill_value_or_zero()
                .repeat(self.inner_chunk_shape.num_elements_usize())
        });
        let result = if self.is_sharded() {
            self.flush_block_to_shard(&current.chunk_indices, &block)
        } else {
            self.write_encoded_chunk(&self.codecs, &current.chunk_indices, block.clone())
        };
        self.state.get_mut().current = Some(CurrentBlock {
            chunk_indices: current.chunk_indices,
            block: Some(block),
            dirty: result.is_err(),
        });
        result
    }

    /// Make `block` the dirty current block at `chunk_indices`, flushing the previous one if it differs.
    fn set_dirty_block(&mut self, chunk_indices: &[u64], block: Vec<u8>) -> Result<(), ArrayError> {
        let is_current = self
            .state
            .get_mut()
            .current
            .as_ref()
            .is_some_and(|current| current.chunk_indices == chunk_indices);
        if !is_current {
            self.flush_current()?;
        }
        let state = self.state.get_mut();
        state.blocks.remove(chunk_indices);
        state.current = Some(CurrentBlock {
            chunk_indices: chunk_indices.to_vec(),
            block: Some(block),
            dirty: true,
        });
        Ok(())
    }

    /// Flush pending writes and the array metadata if it was modified.
    ///
    /// The dirty block is written, then every in-flight shard is encoded and stored, and the current block is forgotten.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] on a storage or codec error.
    pub fn flush(&mut self) -> Result<(), ArrayError> {
        self.flush_current()?;
        self.flush_shard_writes()?;
        self.state.get_mut().current = None;
        if self.metadata_modified {
            self.store_metadata()?;
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), ArrayError> {
        if self.storage.readonly() {
            Err(ArrayError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Encode `chunk_bytes` and store them in the block (inner chunk) at `chunk_indices`.
    ///
    /// The block becomes the dirty current block and is written on the next write to a different block or [`flush`](Array::flush).
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `chunk_indices` are invalid,
    ///  - the length of `chunk_bytes` does not match the block size,
    ///  - the store is read only, or
    ///  - flushing the previous block fails.
    pub fn store_chunk(&mut self, chunk_indices: &[u64], chunk_bytes: Vec<u8>) -> Result<(), ArrayError> {
        self.check_writable()?;
        self.chunk_subset(chunk_indices)?;
        let expected = self.inner_chunk_shape.num_elements() * self.data_type.size() as u64;
        if chunk_bytes.len() as u64 != expected {
            return Err(ArrayError::InvalidBytesInputSize(chunk_bytes.len(), expected));
        }
        self.set_dirty_block(chunk_indices, chunk_bytes)
    }

    /// Returns the chunk (shard) grid region covered by `array_subset` if it is aligned to the chunk grid and spans at least two chunks.
    ///
    /// A subset is aligned if, on every dimension, it starts on a chunk boundary and its size is a multiple of the chunk size or it reaches the end of the array.
    fn bulk_write_chunks(&self, array_subset: &ArraySubset) -> Option<ArraySubset> {
        let aligned = itertools::izip!(
            array_subset.start(),
            array_subset.shape(),
            self.chunk_shape.iter(),
            &self.shape
        )
        .all(|(&start, &size, chunk, &array_size)| {
            start % chunk.get() == 0 && (size % chunk.get() == 0 || start + size == array_size)
        });
        if !aligned || array_subset.is_empty() {
            return None;
        }
        let chunks = array_subset
            .chunks(&self.chunk_shape.to_array_shape())
            .ok()?;
        (chunks.num_elements() >= 2).then_some(chunks)
    }

    /// Encode and store each chunk (shard) of `chunks` from `bytes` of `array_subset` in parallel.
    fn store_chunks_parallel(
        &mut self,
        chunks: &ArraySubset,
        array_subset: &ArraySubset,
        bytes: &[u8],
    ) -> Result<(), ArrayError> {
        self.state.get_mut().blocks.clear();
        self.flush_current()?;
        self.flush_shard_writes()?;
        self.state.get_mut().current = None;

        let chunk_indices: Vec<ArrayIndices> = chunks.indices().collect();
        let num_workers = worker_count(global_config().max_threads(), chunk_indices.len());
        log::debug!(
            "storing {} chunks of array {} with {num_workers} workers",
            chunk_indices.len(),
            self.path
        );
        let states = (0..num_workers).map(|_| self.codecs.clone()).collect();
        let array = &*self;
        let chunk_shape = array.chunk_shape.to_array_shape();
        let element_size = array.data_type.size();
        for_each_partitioned(&chunk_indices, states, |codecs, chunk_indices| {
            let chunk_start: Vec<u64> = std::iter::zip(chunk_indices, &chunk_shape)
                .map(|(index, size)| index * size)
                .collect();
            let chunk_subset = ArraySubset::new_with_start_shape(chunk_start, chunk_shape.clone())?;
            let overlap = array_subset.overlap(&chunk_subset)?;
            let mut chunk_bytes = array
                .fill_value_or_zero()
                .repeat(array.chunk_shape.num_elements_usize());
            copy_subarray(
                bytes,
                array_subset.shape(),
                overlap.relative_to(array_subset.start())?.start(),
                &mut chunk_bytes,
                &chunk_shape,
                overlap.relative_to(chunk_subset.start())?.start(),
                overlap.shape(),
                element_size,
            );
            array.write_encoded_chunk(codecs, chunk_indices, chunk_bytes)
        })
    }

    /// Store `bytes` of `array_subset` one block at a time through the current block.
    fn store_array_subset_blocks(
        &mut self,
        array_subset: &ArraySubset,
        bytes: &[u8],
    ) -> Result<(), ArrayError> {
        let element_size = self.data_type.size();
        let inner_chunk_shape = self.inner_chunk_shape.to_array_shape();
        let array_bounds = ArraySubset::new_with_shape(self.shape.clone());
        for chunk_indices in array_subset.chunks(&inner_chunk_shape)?.indices() {
            let chunk_subset = self.chunk_subset(&chunk_indices)?;
            let overlap = array_subset.overlap(&chunk_subset)?;
            let in_bounds = chunk_subset.overlap(&array_bounds)?;

            let state = self.state.get_mut();
            let block = if state.is_dirty(&chunk_indices) {
                state.current.take().and_then(|current| current.block)
            } else {
                self.flush_current()?;
                if overlap == in_bounds {
                    None
                } else {
                    self.read_block(&chunk_indices)?
                }
            };
            let mut block = block.unwrap_or_else(|| {
                self.fill_value_or_zero()
                    .repeat(self.inner_chunk_shape.num_elements_usize())
            });
            copy_subarray(
                bytes,
                array_subset.shape(),
                overlap.relative_to(array_subset.start())?.start(),
                &mut block,
                &inner_chunk_shape,
                overlap.relative_to(chunk_subset.start())?.start(),
                overlap.shape(),
                element_size,
            );
            self.set_dirty_block(&chunk_indices, block)?;
        }
        Ok(())
    }

    fn validate_subset_bytes(&self, array_subset: &ArraySubset, bytes: &[u8]) -> Result<(), ArrayError> {
        self.check_writable()?;
        self.validate_array_subset(array_subset)?;
        let expected = array_subset.num_elements() * self.data_type.size() as u64;
        if bytes.len() as u64 == expected {
            Ok(())
        } else {
            Err(ArrayError::InvalidBytesInputSize(bytes.len(), expected))
        }
    }

    /// Encode `subset_bytes` and store them in `array_subset`.
    ///
    /// A subset aligned to the chunk (shard) grid spanning two or more chunks is written directly in parallel with up to [`max_threads`](crate::config::Config#maximum-threads) workers.
    /// Any other subset is written block by block through the dirty current block.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the `array_subset` is out of bounds of the array,
    ///  - the length of `subset_bytes` does not match the subset,
    ///  - the store is read only, or
    ///  - there is a storage or codec error.
    pub fn store_array_subset(
        &mut self,
        array_subset: &ArraySubset,
        subset_bytes: &[u8],
    ) -> Result<(), ArrayError> {
        self.validate_subset_bytes(array_subset, subset_bytes)?;
        if let Some(chunks) = self.bulk_write_chunks(array_subset) {
            self.store_chunks_parallel(&chunks, array_subset, subset_bytes)
        } else {
            self.store_array_subset_blocks(array_subset, subset_bytes)
        }
    }

    /// Encode `subset_elements` and store them in `array_subset`.
    ///
    /// Elements are converted to the data type of the array if `T` does not match it (see [`element`](crate::array::element)), in which case the subset is always written block by block.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the elements cannot be converted or there is an error storing the subset.
    pub fn store_array_subset_elements<T: Element>(
        &mut self,
        array_subset: &ArraySubset,
        subset_elements: &[T],
    ) -> Result<(), ArrayError> {
        let bytes = elements_to_array_bytes(subset_elements, &self.data_type)?;
        if T::matches_data_type(&self.data_type) {
            self.store_array_subset(array_subset, &bytes)
        } else {
            self.validate_subset_bytes(array_subset, &bytes)?;
            self.store_array_subset_blocks(array_subset, &bytes)
        }
    }

    /// Erase the chunk (shard) at `chunk_indices` of the chunk grid, discarding any pending writes to it.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the store is read only or there is a storage error.
    pub fn erase_chunk(&mut self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        self.check_writable()?;
        let chunk_indices = chunk_indices.to_vec();
        let blocks_per_chunk: Vec<u64> = std::iter::zip(self.chunk_shape.iter(), self.inner_chunk_shape.iter())
            .map(|(outer, inner)| outer.get() / inner.get())
            .collect();
        let num_blocks = blocks_per_chunk.iter().product::<u64>();
        let block_indices: Vec<ArrayIndices> = (0..num_blocks)
            .map(|i| {
                std::iter::zip(&chunk_indices, unravel_index(i, &blocks_per_chunk))
                    .zip(&blocks_per_chunk)
                    .map(|((chunk, offset), per_chunk)| chunk * per_chunk + offset)
                    .collect()
            })
            .collect();

        let state = self.state.get_mut();
        state.shard_writes.remove(&chunk_indices);
        for block in &block_indices {
            state.blocks.remove(block);
        }
        if state
            .current
            .as_ref()
            .is_some_and(|current| block_indices.contains(&current.chunk_indices))
        {
            state.current = None;
        }
        self.storage.erase(&self.chunk_key(&chunk_indices)?)?;
        self.state.get_mut().set_present(&chunk_indices, false);
        Ok(())
    }
}

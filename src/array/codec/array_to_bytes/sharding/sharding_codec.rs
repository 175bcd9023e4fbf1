use std::{
    collections::{BTreeSet, HashMap},
    num::NonZeroU64,
};

use rayon::prelude::*;

use crate::{
    array::{
        codec::{
            ArrayCodecTraits, ArrayToBytesCodecTraits, BytesPartialDecoderTraits, CodecChain,
            CodecError, CodecTraits,
        },
        ravel_indices, unravel_index, BytesRepresentation, ChunkRepresentation, ChunkShape,
    },
    array_subset::{copy_subarray, ArrayExtractBytesError, ArraySubset},
    byte_range::ByteRange,
    metadata::Metadata,
    plugin::PluginCreateError,
};

use super::{
    calculate_chunks_per_shard, compute_index_encoded_size, decode_shard_index,
    sharding_index_decoded_representation, ShardingCodecConfiguration, ShardingIndexLocation,
    IDENTIFIER,
};

/// A `sharding_indexed` codec implementation.
#[derive(Clone, Debug)]
pub struct ShardingCodec {
    /// The shape of the inner chunks in a shard along each dimension of the outer array.
    chunk_shape: ChunkShape,
    /// The codecs used to encode and decode inner chunks.
    inner_codecs: CodecChain,
    /// The codecs used to encode and decode the shard index.
    index_codecs: CodecChain,
    /// Whether the shard index is located at the beginning or end of the shard.
    index_location: ShardingIndexLocation,
}

impl ShardingCodec {
    /// Create a new `sharding_indexed` codec.
    #[must_use]
    pub fn new(
        chunk_shape: ChunkShape,
        inner_codecs: CodecChain,
        index_codecs: CodecChain,
        index_location: ShardingIndexLocation,
    ) -> Self {
        Self {
            chunk_shape,
            inner_codecs,
            index_codecs,
            index_location,
        }
    }

    /// Create a new `sharding_indexed` codec from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PluginCreateError`] if an inner or index codec cannot be created.
    pub fn new_with_configuration(
        configuration: &ShardingCodecConfiguration,
    ) -> Result<Self, PluginCreateError> {
        let inner_codecs = CodecChain::from_metadata(&configuration.codecs)?;
        let index_codecs = CodecChain::from_metadata(&configuration.index_codecs)?;
        Ok(Self::new(
            configuration.chunk_shape.clone(),
            inner_codecs,
            index_codecs,
            configuration.index_location,
        ))
    }

    /// The codecs used to encode and decode inner chunks.
    #[must_use]
    pub fn inner_codecs(&self) -> &CodecChain {
        &self.inner_codecs
    }

    /// The codecs used to encode and decode the shard index.
    #[must_use]
    pub fn index_codecs(&self) -> &CodecChain {
        &self.index_codecs
    }

    fn inner_chunk_representation(
        &self,
        shard_representation: &ChunkRepresentation,
    ) -> Result<ChunkRepresentation, CodecError> {
        ChunkRepresentation::new(
            self.chunk_shape.clone(),
            shard_representation.data_type().clone(),
            shard_representation.fill_value().clone(),
        )
        .map_err(|err| CodecError::Other(err.to_string()))
    }

    /// The subset of the shard covered by the inner chunk at `chunk_indices`.
    fn inner_chunk_subset(&self, chunk_indices: &[u64]) -> ArraySubset {
        let start = std::iter::zip(chunk_indices, self.chunk_shape.iter())
            .map(|(i, c)| i * c.get())
            .collect::<Vec<_>>();
        let end = std::iter::zip(&start, self.chunk_shape.iter())
            .map(|(s, c)| s + c.get())
            .collect::<Vec<_>>();
        ArraySubset::new_with_ranges(
            &std::iter::zip(start, end)
                .map(|(s, e)| s..e)
                .collect::<Vec<_>>(),
        )
    }

    /// The byte range of the encoded index within a shard.
    fn index_byte_range(&self, index_encoded_size: u64) -> ByteRange {
        match self.index_location {
            ShardingIndexLocation::Start => ByteRange::FromStart(0, Some(index_encoded_size)),
            ShardingIndexLocation::End => ByteRange::FromEnd(0, Some(index_encoded_size)),
        }
    }

    fn decode_index(
        &self,
        encoded_shard: &[u8],
        chunks_per_shard: &[NonZeroU64],
    ) -> Result<Vec<u64>, CodecError> {
        let index_representation = sharding_index_decoded_representation(chunks_per_shard)?;
        let index_encoded_size =
            compute_index_encoded_size(&self.index_codecs, &index_representation)?;
        if (encoded_shard.len() as u64) < index_encoded_size {
            return Err(CodecError::Other(
                "the encoded shard is smaller than its index".to_string(),
            ));
        }
        let range = self
            .index_byte_range(index_encoded_size)
            .to_range(encoded_shard.len() as u64);
        #[allow(clippy::cast_possible_truncation)]
        let encoded_shard_index = encoded_shard[range.start as usize..range.end as usize].to_vec();
        decode_shard_index(
            encoded_shard_index,
            &index_representation,
            &self.index_codecs,
        )
    }

    /// The byte range of the inner chunk `chunk_index` from the shard index, or [`None`] if it is not stored.
    fn inner_chunk_byte_range(
        shard_index: &[u64],
        chunk_index: usize,
    ) -> Result<Option<(u64, u64)>, CodecError> {
        let (Some(&offset), Some(&size)) = (
            shard_index.get(chunk_index * 2),
            shard_index.get(chunk_index * 2 + 1),
        ) else {
            return Err(CodecError::Other(format!(
                "inner chunk {chunk_index} is not in the shard index"
            )));
        };
        if offset == u64::MAX && size == u64::MAX {
            Ok(None)
        } else {
            Ok(Some((offset, size)))
        }
    }
}

impl CodecTraits for ShardingCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        let configuration = ShardingCodecConfiguration {
            chunk_shape: self.chunk_shape.clone(),
            codecs: self.inner_codecs.create_metadatas(),
            index_codecs: self.index_codecs.create_metadatas(),
            index_location: self.index_location,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).ok()
    }
}

impl ArrayCodecTraits for ShardingCodec {
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        shard_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let expected = shard_representation.size_usize();
        if decoded_value.len() != expected {
            return Err(CodecError::UnexpectedDecodedSize {
                expected,
                got: decoded_value.len(),
            });
        }

        let chunks_per_shard =
            calculate_chunks_per_shard(shard_representation.shape(), &self.chunk_shape)?;
        let chunks_per_shard_u64 = chunks_per_shard.to_array_shape();
        let chunk_representation = self.inner_chunk_representation(shard_representation)?;
        let shard_shape = shard_representation.shape_u64();
        let element_size = shard_representation.element_size();

        // Encode the inner chunks that are not entirely the fill value
        let encoded_chunks: Vec<(usize, Vec<u8>)> = (0..chunks_per_shard.num_elements_usize())
            .into_par_iter()
            .filter_map(|chunk_index| {
                let chunk_indices = unravel_index(chunk_index as u64, &chunks_per_shard_u64);
                let chunk_subset = self.inner_chunk_subset(&chunk_indices);
                let bytes = match chunk_subset.extract_bytes(&decoded_value, &shard_shape, element_size) {
                    Ok(bytes) => bytes,
                    Err(err) => return Some(Err(CodecError::from(err))),
                };
                if chunk_representation.fill_value().equals_all(&bytes) {
                    None
                } else {
                    Some(
                        self.inner_codecs
                            .encode(bytes, &chunk_representation)
                            .map(|encoded| (chunk_index, encoded)),
                    )
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if encoded_chunks.is_empty() {
            return Ok(vec![]);
        }

        let index_representation = sharding_index_decoded_representation(&chunks_per_shard)?;
        let index_encoded_size =
            compute_index_encoded_size(&self.index_codecs, &index_representation)?;
        let mut shard_index = vec![u64::MAX; index_representation.num_elements_usize()];
        let mut offset = match self.index_location {
            ShardingIndexLocation::Start => index_encoded_size,
            ShardingIndexLocation::End => 0,
        };
        for (chunk_index, encoded_chunk) in &encoded_chunks {
            shard_index[chunk_index * 2] = offset;
            shard_index[chunk_index * 2 + 1] = encoded_chunk.len() as u64;
            offset += encoded_chunk.len() as u64;
        }
        let encoded_index = self.index_codecs.encode(
            bytemuck::cast_slice(&shard_index).to_vec(),
            &index_representation,
        )?;

        let chunks_length = encoded_chunks
            .iter()
            .map(|(_, encoded)| encoded.len())
            .sum::<usize>();
        let mut shard = Vec::with_capacity(chunks_length + encoded_index.len());
        if self.index_location == ShardingIndexLocation::Start {
            shard.extend_from_slice(&encoded_index);
        }
        for (_, encoded_chunk) in &encoded_chunks {
            shard.extend_from_slice(encoded_chunk);
        }
        if self.index_location == ShardingIndexLocation::End {
            shard.extend_from_slice(&encoded_index);
        }
        Ok(shard)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        shard_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        if encoded_value.is_empty() {
            return Ok(shard_representation.fill_bytes());
        }

        let chunks_per_shard =
            calculate_chunks_per_shard(shard_representation.shape(), &self.chunk_shape)?;
        let chunks_per_shard_u64 = chunks_per_shard.to_array_shape();
        let chunk_representation = self.inner_chunk_representation(shard_representation)?;
        let shard_index = self.decode_index(&encoded_value, &chunks_per_shard)?;

        let decoded_chunks: Vec<(usize, Vec<u8>)> = (0..chunks_per_shard.num_elements_usize())
            .into_par_iter()
            .filter_map(|chunk_index| {
                match Self::inner_chunk_byte_range(&shard_index, chunk_index) {
                    Ok(None) => None,
                    Ok(Some((offset, size))) => {
                        let end = offset.saturating_add(size);
                        if end > encoded_value.len() as u64 {
                            return Some(Err(CodecError::Other(format!(
                                "inner chunk {chunk_index} at bytes {offset}..{end} is beyond the end of the shard"
                            ))));
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        let encoded = encoded_value[offset as usize..end as usize].to_vec();
                        Some(
                            self.inner_codecs
                                .decode(encoded, &chunk_representation)
                                .map(|decoded| (chunk_index, decoded)),
                        )
                    }
                    Err(err) => Some(Err(err)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let shard_shape = shard_representation.shape_u64();
        let chunk_shape = self.chunk_shape.to_array_shape();
        let mut shard = shard_representation.fill_bytes();
        for (chunk_index, decoded) in decoded_chunks {
            let chunk_indices = unravel_index(chunk_index as u64, &chunks_per_shard_u64);
            let chunk_subset = self.inner_chunk_subset(&chunk_indices);
            copy_subarray(
                &decoded,
                &chunk_shape,
                &vec![0; chunk_shape.len()],
                &mut shard,
                &shard_shape,
                chunk_subset.start(),
                &chunk_shape,
                shard_representation.element_size(),
            );
        }
        Ok(shard)
    }
}

impl ArrayToBytesCodecTraits for ShardingCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError> {
        let chunk_representation = self.inner_chunk_representation(decoded_representation)?;
        let chunk_bytes_representation = self
            .inner_codecs
            .compute_encoded_size(&chunk_representation)?;
        match chunk_bytes_representation {
            BytesRepresentation::BoundedSize(size) | BytesRepresentation::FixedSize(size) => {
                let chunks_per_shard =
                    calculate_chunks_per_shard(decoded_representation.shape(), &self.chunk_shape)?;
                let index_representation =
                    sharding_index_decoded_representation(&chunks_per_shard)?;
                let index_encoded_size =
                    compute_index_encoded_size(&self.index_codecs, &index_representation)?;
                Ok(BytesRepresentation::BoundedSize(
                    chunks_per_shard.num_elements() * size + index_encoded_size,
                ))
            }
            BytesRepresentation::UnboundedSize => Ok(BytesRepresentation::UnboundedSize),
        }
    }

    fn inner_chunk_shape(&self) -> Option<&ChunkShape> {
        Some(&self.chunk_shape)
    }

    fn supports_partial_decoding(&self) -> bool {
        true
    }

    /// Decode `array_subsets` of a shard, reading the shard index once and every needed inner chunk once.
    ///
    /// The inner chunks intersecting any subset are fetched with a single batched byte range request and decoded in parallel.
    fn partial_decode(
        &self,
        input: &dyn BytesPartialDecoderTraits,
        shard_representation: &ChunkRepresentation,
        array_subsets: &[ArraySubset],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        let shard_shape = shard_representation.shape_u64();
        let element_size = shard_representation.element_size();
        for array_subset in array_subsets {
            if !array_subset.inbounds(&shard_shape) {
                return Err(ArrayExtractBytesError::new(
                    array_subset.clone(),
                    shard_shape,
                    element_size,
                )
                .into());
            }
        }

        let chunks_per_shard =
            calculate_chunks_per_shard(shard_representation.shape(), &self.chunk_shape)?;
        let chunks_per_shard_u64 = chunks_per_shard.to_array_shape();
        let chunk_representation = self.inner_chunk_representation(shard_representation)?;
        let chunk_shape = self.chunk_shape.to_array_shape();

        // Read and decode the shard index
        let index_representation = sharding_index_decoded_representation(&chunks_per_shard)?;
        let index_encoded_size =
            compute_index_encoded_size(&self.index_codecs, &index_representation)?;
        let Some(mut encoded_index) =
            input.partial_decode(&[self.index_byte_range(index_encoded_size)])?
        else {
            return Ok(None);
        };
        let encoded_index = encoded_index
            .pop()
            .ok_or_else(|| CodecError::from("missing shard index"))?;
        let shard_index = decode_shard_index(
            encoded_index.to_vec(),
            &index_representation,
            &self.index_codecs,
        )?;

        // Collect the inner chunks intersecting any subset
        let mut needed_chunks = BTreeSet::new();
        for array_subset in array_subsets {
            let chunks = array_subset.chunks(&chunk_shape)?;
            for chunk_indices in chunks.indices() {
                needed_chunks.insert(ravel_indices(&chunk_indices, &chunks_per_shard_u64));
            }
        }
        let mut stored_chunks = Vec::with_capacity(needed_chunks.len());
        let mut byte_ranges = Vec::with_capacity(needed_chunks.len());
        for chunk_index in needed_chunks {
            let chunk_index_usize = usize::try_from(chunk_index)
                .map_err(|_| CodecError::from("inner chunk index overflow"))?;
            if let Some((offset, size)) =
                Self::inner_chunk_byte_range(&shard_index, chunk_index_usize)?
            {
                stored_chunks.push(chunk_index);
                byte_ranges.push(ByteRange::FromStart(offset, Some(size)));
            }
        }

        // Read and decode the stored inner chunks
        let encoded_chunks = if byte_ranges.is_empty() {
            vec![]
        } else {
            let Some(encoded_chunks) = input.partial_decode(&byte_ranges)? else {
                return Ok(None);
            };
            encoded_chunks
        };
        if encoded_chunks.len() != stored_chunks.len() {
            return Err(CodecError::Other(format!(
                "expected {} inner chunks, read {}",
                stored_chunks.len(),
                encoded_chunks.len()
            )));
        }
        let decoded_chunks: HashMap<u64, Vec<u8>> = stored_chunks
            .into_par_iter()
            .zip(encoded_chunks)
            .map(|(chunk_index, encoded)| {
                self.inner_codecs
                    .decode(encoded.to_vec(), &chunk_representation)
                    .map(|decoded| (chunk_index, decoded))
            })
            .collect::<Result<_, _>>()?;

        // Assemble the subsets
        let fill_chunk = chunk_representation.fill_bytes();
        let mut outputs = Vec::with_capacity(array_subsets.len());
        for array_subset in array_subsets {
            let mut output = vec![0; array_subset.num_elements_usize() * element_size];
            for chunk_indices in array_subset.chunks(&chunk_shape)?.indices() {
                let chunk_index = ravel_indices(&chunk_indices, &chunks_per_shard_u64);
                let chunk_subset = self.inner_chunk_subset(&chunk_indices);
                let overlap = array_subset.overlap(&chunk_subset)?;
                let source = decoded_chunks.get(&chunk_index).unwrap_or(&fill_chunk);
                copy_subarray(
                    source,
                    &chunk_shape,
                    overlap.relative_to(chunk_subset.start())?.start(),
                    &mut output,
                    array_subset.shape(),
                    overlap.relative_to(array_subset.start())?.start(),
                    overlap.shape(),
                    element_size,
                );
            }
            outputs.push(output);
        }
        Ok(Some(outputs))
    }
}

//! The `sharding_indexed` array to bytes codec.
//!
//! Sharding splits a chunk (a shard) into inner chunks that are individually encoded and stored together in one value, followed (or preceded) by an index.
//! The index is an array of `(offset, nbytes)` pairs of `u64`, one per inner chunk in C order, encoded with its own codec chain.
//! Inner chunks equal to the fill value are not stored: their index entry is `(u64::MAX, u64::MAX)`.
//!
//! A shard with no stored inner chunks encodes to an empty value.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/codecs/sharding-indexed/v1.0.html>.
//!
//! The [`ShardingCodecBuilder`] can help with creating a [`ShardingCodec`].

mod sharding_codec;
mod sharding_codec_builder;

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

pub use sharding_codec::ShardingCodec;
pub use sharding_codec_builder::ShardingCodecBuilder;

use crate::{
    array::{
        codec::{ArrayCodecTraits, ArrayToBytesCodecTraits, Codec, CodecError, CodecPlugin},
        BytesRepresentation, ChunkRepresentation, ChunkShape, DataType, FillValue,
    },
    metadata::Metadata,
    plugin::PluginCreateError,
};

use super::codec_chain::CodecChain;

/// The identifier for the `sharding_indexed` codec.
pub const IDENTIFIER: &str = "sharding_indexed";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_sharding, create_codec_sharding)
}

fn is_name_sharding(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_sharding(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: ShardingCodecConfiguration = metadata.to_configuration()?;
    let codec = ShardingCodec::new_with_configuration(&configuration)?;
    Ok(Codec::ArrayToBytes(Box::new(codec)))
}

/// Configuration parameters for the `sharding_indexed` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ShardingCodecConfiguration {
    /// The shape of the inner chunks in a shard along each dimension of the outer array.
    pub chunk_shape: ChunkShape,
    /// The codecs used to encode and decode inner chunks.
    pub codecs: Vec<Metadata>,
    /// The codecs used to encode and decode the shard index.
    pub index_codecs: Vec<Metadata>,
    /// Whether the shard index is located at the beginning or end of the shard.
    #[serde(default)]
    pub index_location: ShardingIndexLocation,
}

/// The location of the shard index.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShardingIndexLocation {
    /// The index is at the start of the shard, before the inner chunks.
    Start,
    /// The index is at the end of the shard, after the inner chunks.
    #[default]
    End,
}

/// The number of inner chunks along each dimension of a shard.
fn calculate_chunks_per_shard(
    shard_shape: &[NonZeroU64],
    chunk_shape: &[NonZeroU64],
) -> Result<ChunkShape, CodecError> {
    if shard_shape.len() != chunk_shape.len() {
        return Err(CodecError::Other(format!(
            "inner chunk shape {chunk_shape:?} does not match the dimensionality of shard shape {shard_shape:?}"
        )));
    }
    std::iter::zip(shard_shape, chunk_shape)
        .map(|(s, c)| {
            if s.get() % c.get() == 0 {
                NonZeroU64::new(s.get() / c.get())
            } else {
                None
            }
        })
        .collect::<Option<Vec<_>>>()
        .map(ChunkShape::from)
        .ok_or_else(|| {
            CodecError::Other(format!(
                "inner chunk shape {chunk_shape:?} does not evenly divide shard shape {shard_shape:?}"
            ))
        })
}

/// The decoded representation of the shard index: `chunks_per_shard` x 2 `u64` values.
fn sharding_index_decoded_representation(
    chunks_per_shard: &[NonZeroU64],
) -> Result<ChunkRepresentation, CodecError> {
    let mut index_shape = Vec::with_capacity(chunks_per_shard.len() + 1);
    index_shape.extend_from_slice(chunks_per_shard);
    index_shape.push(NonZeroU64::MIN.saturating_add(1));
    ChunkRepresentation::new(
        index_shape.into(),
        DataType::UInt64,
        FillValue::from(u64::MAX),
    )
    .map_err(|err| CodecError::Other(err.to_string()))
}

fn compute_index_encoded_size(
    index_codecs: &CodecChain,
    index_representation: &ChunkRepresentation,
) -> Result<u64, CodecError> {
    match index_codecs.compute_encoded_size(index_representation)? {
        BytesRepresentation::FixedSize(size) => Ok(size),
        _ => Err(CodecError::Other(
            "the shard index codecs must produce a fixed size output".to_string(),
        )),
    }
}

fn decode_shard_index(
    encoded_shard_index: Vec<u8>,
    index_representation: &ChunkRepresentation,
    index_codecs: &CodecChain,
) -> Result<Vec<u64>, CodecError> {
    let decoded_shard_index = index_codecs.decode(encoded_shard_index, index_representation)?;
    Ok(bytemuck::pod_collect_to_vec(&decoded_shard_index))
}

#[cfg(test)]
mod tests {
    use crate::{
        array::codec::{
            ArrayCodecTraits, BytesCodec, BytesPartialDecoderTraits, CodecTraits,
        },
        array_subset::ArraySubset,
        byte_range::{extract_byte_ranges, ByteRange},
        storage::{Bytes, MaybeBytes},
    };

    use super::*;

    const JSON_VALID: &str = r#"{
    "chunk_shape": [2, 2],
    "codecs": [
        {
            "name": "bytes",
            "configuration": {
                "endian": "little"
            }
        },
        {
            "name": "gzip",
            "configuration": {
                "level": 1
            }
        }
    ],
    "index_codecs": [
        {
            "name": "bytes",
            "configuration": {
                "endian": "little"
            }
        },
        "crc32c"
    ],
    "index_location": "start"
}"#;

    struct BytesInput(Bytes);

    impl BytesPartialDecoderTraits for BytesInput {
        fn partial_decode(
            &self,
            byte_ranges: &[ByteRange],
        ) -> Result<Option<Vec<Bytes>>, CodecError> {
            Ok(Some(
                extract_byte_ranges(&self.0, byte_ranges)?
                    .into_iter()
                    .map(Bytes::from)
                    .collect(),
            ))
        }

        fn decode(&self) -> Result<MaybeBytes, CodecError> {
            Ok(Some(self.0.clone()))
        }
    }

    fn shard_representation() -> ChunkRepresentation {
        ChunkRepresentation::new(
            vec![4, 4].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        )
        .unwrap()
    }

    fn shard_elements() -> Vec<u16> {
        // the top left inner chunk is all fill value
        (0..16u16)
            .map(|i| if i / 4 < 2 && i % 4 < 2 { 0 } else { i })
            .collect()
    }

    fn to_bytes(elements: &[u16]) -> Vec<u8> {
        elements.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    #[cfg(all(feature = "gzip", feature = "crc32c"))]
    fn codec_sharding_configuration() {
        let configuration: ShardingCodecConfiguration = serde_json::from_str(JSON_VALID).unwrap();
        assert_eq!(configuration.index_location, ShardingIndexLocation::Start);
        let codec = ShardingCodec::new_with_configuration(&configuration).unwrap();
        let metadata = codec.create_metadata().unwrap();
        assert_eq!(
            metadata.to_configuration::<ShardingCodecConfiguration>().unwrap(),
            configuration
        );
        assert_eq!(codec.inner_chunk_shape().unwrap().to_array_shape(), vec![2, 2]);
        assert!(codec.supports_partial_decoding());
    }

    #[test]
    #[cfg(all(feature = "gzip", feature = "crc32c"))]
    fn codec_sharding_round_trip() {
        let configuration: ShardingCodecConfiguration = serde_json::from_str(JSON_VALID).unwrap();
        let codec = ShardingCodec::new_with_configuration(&configuration).unwrap();
        let representation = shard_representation();
        let bytes = to_bytes(&shard_elements());
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        let decoded = codec.decode(encoded, &representation).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn codec_sharding_skips_fill_value_chunks() {
        let codec = ShardingCodecBuilder::new(vec![2, 2].try_into().unwrap()).build();
        let representation = shard_representation();
        let encoded = codec
            .encode(to_bytes(&shard_elements()), &representation)
            .unwrap();
        let index_size = compute_index_encoded_size(
            codec.index_codecs(),
            &sharding_index_decoded_representation(&[
                NonZeroU64::new(2).unwrap(),
                NonZeroU64::new(2).unwrap(),
            ])
            .unwrap(),
        )
        .unwrap();
        // three stored 2x2 u16 inner chunks and the index
        assert_eq!(encoded.len() as u64, 3 * 8 + index_size);

        let empty = codec
            .encode(vec![0; representation.size_usize()], &representation)
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(
            codec.decode(empty, &representation).unwrap(),
            vec![0; representation.size_usize()]
        );
    }

    #[test]
    fn codec_sharding_partial_decode() {
        let codec = ShardingCodecBuilder::new(vec![2, 2].try_into().unwrap())
            .index_location(ShardingIndexLocation::Start)
            .build();
        let representation = shard_representation();
        let elements = shard_elements();
        let encoded = codec
            .encode(to_bytes(&elements), &representation)
            .unwrap();
        let input = BytesInput(Bytes::from(encoded));

        let subsets = [
            ArraySubset::new_with_ranges(&[1..3, 1..4]),
            ArraySubset::new_with_ranges(&[0..2, 0..2]),
            ArraySubset::new_with_ranges(&[2..4, 2..4]),
        ];
        let decoded = codec
            .partial_decode(&input, &representation, &subsets)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        for (subset, decoded) in subsets.iter().zip(decoded) {
            let expected = subset
                .extract_bytes(&to_bytes(&elements), &[4, 4], 2)
                .unwrap();
            assert_eq!(decoded, expected);
        }

        let out_of_bounds = [ArraySubset::new_with_ranges(&[3..5, 0..1])];
        assert!(codec
            .partial_decode(&input, &representation, &out_of_bounds)
            .is_err());
    }

    #[test]
    fn codec_sharding_invalid_inner_chunk_shape() {
        let codec = ShardingCodecBuilder::new(vec![3, 2].try_into().unwrap()).build();
        assert!(codec
            .encode(to_bytes(&shard_elements()), &shard_representation())
            .is_err());
    }

    #[test]
    fn codec_sharding_nested_bytes_codec() {
        let codec = ShardingCodecBuilder::new(vec![4, 2].try_into().unwrap())
            .array_to_bytes_codec(Box::new(BytesCodec::big()))
            .build();
        let representation = shard_representation();
        let bytes = to_bytes(&shard_elements());
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        assert_eq!(codec.decode(encoded, &representation).unwrap(), bytes);
    }
}

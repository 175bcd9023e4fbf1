use crate::array::{
    codec::{
        ArrayToArrayCodecTraits, ArrayToBytesCodecTraits, BytesCodec, BytesToBytesCodecTraits,
        CodecChain,
    },
    ChunkShape,
};

use super::{ShardingCodec, ShardingIndexLocation};

/// A [`ShardingCodec`] builder.
///
/// Inner chunks are encoded with the little endian `bytes` codec unless configured otherwise.
/// The index is always encoded with the little endian `bytes` codec followed by `crc32c` when the `crc32c` feature is enabled.
#[derive(Debug)]
pub struct ShardingCodecBuilder {
    inner_chunk_shape: ChunkShape,
    inner_codecs: (
        Vec<Box<dyn ArrayToArrayCodecTraits>>,
        Box<dyn ArrayToBytesCodecTraits>,
        Vec<Box<dyn BytesToBytesCodecTraits>>,
    ),
    index_location: ShardingIndexLocation,
}

/// The codecs of a shard index.
fn index_codecs() -> CodecChain {
    CodecChain::new(
        vec![],
        Box::new(BytesCodec::little()),
        vec![
            #[cfg(feature = "crc32c")]
            Box::new(crate::array::codec::Crc32cCodec::new()),
        ],
    )
}

impl ShardingCodecBuilder {
    /// Create a builder for shards of inner chunks with shape `inner_chunk_shape`.
    #[must_use]
    pub fn new(inner_chunk_shape: ChunkShape) -> Self {
        Self {
            inner_chunk_shape,
            inner_codecs: (vec![], Box::new(BytesCodec::little()), vec![]),
            index_location: ShardingIndexLocation::default(),
        }
    }

    /// Set the array to array codecs of inner chunks.
    pub fn array_to_array_codecs(
        &mut self,
        array_to_array_codecs: Vec<Box<dyn ArrayToArrayCodecTraits>>,
    ) -> &mut Self {
        self.inner_codecs.0 = array_to_array_codecs;
        self
    }

    /// Set the array to bytes codec of inner chunks.
    pub fn array_to_bytes_codec(
        &mut self,
        array_to_bytes_codec: Box<dyn ArrayToBytesCodecTraits>,
    ) -> &mut Self {
        self.inner_codecs.1 = array_to_bytes_codec;
        self
    }

    /// Set the bytes to bytes codecs of inner chunks.
    pub fn bytes_to_bytes_codecs(
        &mut self,
        bytes_to_bytes_codecs: Vec<Box<dyn BytesToBytesCodecTraits>>,
    ) -> &mut Self {
        self.inner_codecs.2 = bytes_to_bytes_codecs;
        self
    }

    /// Place the index at the start or end of a shard.
    pub fn index_location(&mut self, index_location: ShardingIndexLocation) -> &mut Self {
        self.index_location = index_location;
        self
    }

    /// Build into a [`ShardingCodec`].
    #[must_use]
    pub fn build(&self) -> ShardingCodec {
        let (array_to_array, array_to_bytes, bytes_to_bytes) = &self.inner_codecs;
        ShardingCodec::new(
            self.inner_chunk_shape.clone(),
            CodecChain::new(
                array_to_array.clone(),
                array_to_bytes.clone(),
                bytes_to_bytes.clone(),
            ),
            index_codecs(),
            self.index_location,
        )
    }
}

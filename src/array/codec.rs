//! Codecs.
//!
//! Array chunks are encoded using a sequence of codecs, each of which specifies a bidirectional transform (an encode transform and a decode transform).
//! A codec can map an array to an array, an array to bytes, or bytes to bytes.
//!
//! A [`CodecChain`] represents a codec sequence consisting of any number of array to array and bytes to bytes codecs, and one array to bytes codec.
//! A codec chain is itself an array to bytes codec.
//!
//! The [`ShardingCodec`] is the only codec that supports partial decoding: it can decode a subset of a shard by reading only the shard index and the inner chunks intersecting the subset.
//! A codec chain supports partial decoding if it consists of a sharding codec alone.
//! Otherwise a partial decode falls back to decoding the whole input and extracting the requested subsets.
//!
//! Codecs are immutable and cheap to clone; concurrent operations clone the codec chain for each unit of work.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#id18>.

pub mod array_to_array;
pub mod array_to_bytes;
pub mod bytes_to_bytes;

pub use array_to_array::transpose::{TransposeCodec, TransposeCodecConfiguration, TransposeOrder};
pub use array_to_bytes::{
    bytes::{BytesCodec, BytesCodecConfiguration, Endianness, NATIVE_ENDIAN},
    codec_chain::CodecChain,
    sharding::{
        ShardingCodec, ShardingCodecBuilder, ShardingCodecConfiguration, ShardingIndexLocation,
    },
};
#[cfg(feature = "crc32c")]
pub use bytes_to_bytes::crc32c::Crc32cCodec;
#[cfg(feature = "gzip")]
pub use bytes_to_bytes::gzip::{GzipCodec, GzipCodecConfiguration, GzipCompressionLevelError};
#[cfg(feature = "zstd")]
pub use bytes_to_bytes::zstd::{ZstdCodec, ZstdCodecConfiguration};

use thiserror::Error;

use crate::{
    array_subset::{
        ArrayExtractBytesError, ArrayStoreBytesError, ArraySubset, IncompatibleDimensionalityError,
    },
    byte_range::{ByteRange, InvalidByteRangeError},
    metadata::Metadata,
    plugin::{create_from_registry, Plugin, PluginCreateError},
    storage::{Bytes, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey},
};

use super::{BytesRepresentation, ChunkRepresentation, DataType};

/// A generic array to array, array to bytes, or bytes to bytes codec.
#[derive(Debug)]
pub enum Codec {
    /// An array to array codec.
    ArrayToArray(Box<dyn ArrayToArrayCodecTraits>),
    /// An array to bytes codec.
    ArrayToBytes(Box<dyn ArrayToBytesCodecTraits>),
    /// A bytes to bytes codec.
    BytesToBytes(Box<dyn BytesToBytesCodecTraits>),
}

/// A codec plugin.
pub type CodecPlugin = Plugin<Codec>;
inventory::collect!(CodecPlugin);

impl Codec {
    /// Create a codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PluginCreateError`] if the metadata is invalid or not associated with a registered codec plugin.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, PluginCreateError> {
        create_from_registry(inventory::iter::<CodecPlugin>, metadata, "codec")
    }
}

/// Codec traits.
pub trait CodecTraits: Send + Sync {
    /// Create metadata.
    ///
    /// A hidden codec (e.g. a cache) will return [`None`], since it will not have any associated metadata.
    fn create_metadata(&self) -> Option<Metadata>;
}

/// Traits for both array to array and array to bytes codecs.
pub trait ArrayCodecTraits: CodecTraits {
    /// Encode a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a codec fails or `decoded_value` is incompatible with `decoded_representation`.
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decode a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a codec fails or the decoded output is incompatible with `decoded_representation`.
    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Traits for array to array codecs.
pub trait ArrayToArrayCodecTraits:
    ArrayCodecTraits + dyn_clone::DynClone + core::fmt::Debug
{
    /// Returns the encoded chunk representation given the decoded chunk representation.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the decoded chunk representation is not supported by this codec.
    fn compute_encoded_representation(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<ChunkRepresentation, CodecError>;
}

dyn_clone::clone_trait_object!(ArrayToArrayCodecTraits);

/// Traits for array to bytes codecs.
pub trait ArrayToBytesCodecTraits:
    ArrayCodecTraits + dyn_clone::DynClone + core::fmt::Debug
{
    /// Returns the size of the encoded representation given a size of the decoded representation.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the decoded representation is not supported by this codec.
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError>;

    /// Returns the shape of the independently decodable inner chunks, if this codec stores several of them per encoded value.
    fn inner_chunk_shape(&self) -> Option<&super::ChunkShape> {
        None
    }

    /// Returns true if [`partial_decode`](ArrayToBytesCodecTraits::partial_decode) reads only the parts of the input intersecting the requested subsets.
    fn supports_partial_decoding(&self) -> bool {
        false
    }

    /// Decode `array_subsets` of the chunk read through `input`.
    ///
    /// Returns one buffer per subset, or [`None`] if the input does not exist.
    /// The default implementation decodes the whole input and extracts the subsets.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a codec fails, the input cannot be read, or a subset is out of bounds.
    fn partial_decode(
        &self,
        input: &dyn BytesPartialDecoderTraits,
        decoded_representation: &ChunkRepresentation,
        array_subsets: &[ArraySubset],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        let Some(encoded_value) = input.decode()? else {
            return Ok(None);
        };
        let decoded_value = self.decode(encoded_value.to_vec(), decoded_representation)?;
        extract_array_subsets(&decoded_value, decoded_representation, array_subsets).map(Some)
    }
}

dyn_clone::clone_trait_object!(ArrayToBytesCodecTraits);

/// Traits for bytes to bytes codecs.
pub trait BytesToBytesCodecTraits: CodecTraits + dyn_clone::DynClone + core::fmt::Debug {
    /// Returns the size of the encoded representation given a size of the decoded representation.
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation;

    /// Encode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a codec fails.
    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a codec fails.
    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError>;
}

dyn_clone::clone_trait_object!(BytesToBytesCodecTraits);

/// Partial bytes decoder traits.
///
/// This is the read handle of an encoded value, e.g. a chunk or shard in a store.
pub trait BytesPartialDecoderTraits: Send + Sync {
    /// Read byte ranges of the encoded value.
    ///
    /// Returns [`None`] if the value does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a byte range is invalid or there is an underlying read error.
    fn partial_decode(&self, byte_ranges: &[ByteRange]) -> Result<Option<Vec<Bytes>>, CodecError>;

    /// Read the whole encoded value.
    ///
    /// Returns [`None`] if the value does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if there is an underlying read error.
    fn decode(&self) -> Result<MaybeBytes, CodecError> {
        Ok(self
            .partial_decode(&[ByteRange::FromStart(0, None)])?
            .and_then(|mut values| values.pop()))
    }
}

/// A [`BytesPartialDecoderTraits`] reading a value of a store.
///
/// Byte ranges are read with seeking reads, whole values with a sequential read.
pub struct StoragePartialDecoder<'a, TStorage: ?Sized> {
    storage: &'a TStorage,
    key: StoreKey,
}

impl<'a, TStorage: ?Sized + ReadableStorageTraits> StoragePartialDecoder<'a, TStorage> {
    /// Create a new storage partial decoder reading `key` of `storage`.
    pub fn new(storage: &'a TStorage, key: StoreKey) -> Self {
        Self { storage, key }
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> BytesPartialDecoderTraits
    for StoragePartialDecoder<'_, TStorage>
{
    fn partial_decode(&self, byte_ranges: &[ByteRange]) -> Result<Option<Vec<Bytes>>, CodecError> {
        Ok(self.storage.get_partial_values_key(&self.key, byte_ranges)?)
    }

    fn decode(&self) -> Result<MaybeBytes, CodecError> {
        Ok(self.storage.get(&self.key)?)
    }
}

/// Extract `array_subsets` from the `decoded_value` of a chunk.
fn extract_array_subsets(
    decoded_value: &[u8],
    decoded_representation: &ChunkRepresentation,
    array_subsets: &[ArraySubset],
) -> Result<Vec<Vec<u8>>, CodecError> {
    let shape = decoded_representation.shape_u64();
    let element_size = decoded_representation.element_size();
    array_subsets
        .iter()
        .map(|array_subset| {
            Ok(array_subset.extract_bytes(decoded_value, &shape, element_size)?)
        })
        .collect()
}

/// A codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid byte range was requested.
    #[error(transparent)]
    InvalidByteRangeError(#[from] InvalidByteRangeError),
    /// An invalid array subset was requested.
    #[error(transparent)]
    InvalidArraySubsetError(#[from] ArrayExtractBytesError),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// An array subset could not be stored.
    #[error(transparent)]
    ArrayStoreBytesError(#[from] ArrayStoreBytesError),
    /// The decoded size of a chunk did not match what was expected.
    ///
    /// This indicates corrupt data or a codec configuration that does not match the data.
    #[error("the size of a decoded chunk is {got}, expected {expected}")]
    UnexpectedDecodedSize {
        /// The expected size.
        expected: usize,
        /// The decoded size.
        got: usize,
    },
    /// A checksum is invalid.
    #[error("the checksum is invalid")]
    InvalidChecksum,
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A data type is not supported by a codec.
    #[error("data type {0} is not supported by codec {1}")]
    UnsupportedDataType(DataType, String),
    /// Any other error.
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(error: &str) -> Self {
        Self::Other(error.to_string())
    }
}

impl From<String> for CodecError {
    fn from(error: String) -> Self {
        Self::Other(error)
    }
}

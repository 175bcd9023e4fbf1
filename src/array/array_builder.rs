use std::sync::Arc;

use crate::storage::ReadableWritableListableStorageTraits;

use super::{
    chunk_key_encoding::{ChunkKeyEncoding, ChunkKeySeparator, DefaultChunkKeyEncoding},
    codec::{
        ArrayToArrayCodecTraits, ArrayToBytesCodecTraits, BytesCodec, BytesToBytesCodecTraits,
        ShardingCodecBuilder,
    },
    Array, ArrayCreateError, ArrayShape, ChunkShape, CodecChain, DataType, FillValue,
};

/// An [`Array`] builder.
///
/// The array builder is initialised from an array shape, data type, chunk shape and fill value.
///  - The only codec enabled by default is `bytes` (with little endian encoding), so the output is uncompressed and unsharded.
///  - The default chunk key encoding is `default` with the `/` chunk key separator.
///  - Attributes and dimension names are empty.
///
/// Use the methods in the array builder to change the configuration away from these defaults, and then build the array at a path of some storage with [`ArrayBuilder::build`].
/// Note that [`build`](ArrayBuilder::build) does not modify the store; the array metadata has to be explicitly written with [`Array::store_metadata`].
///
/// For example:
///
/// ```rust
/// # use std::sync::Arc;
/// use zarrs_engine::array::{ArrayBuilder, DataType, FillValue};
/// # let store = Arc::new(zarrs_engine::storage::store::MemoryStore::new());
/// let mut array = ArrayBuilder::new(
///     vec![8, 8], // array shape
///     DataType::Float32,
///     vec![4, 4], // chunk (shard) shape
///     FillValue::from(f32::NAN),
/// )
/// .sharding(Some(vec![2, 2])) // inner chunk shape
/// .dimension_names(Some(vec![Some("y".into()), Some("x".into())]))
/// .build(store.clone(), "/group/array")?;
/// array.store_metadata()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ArrayBuilder {
    /// Array shape.
    pub shape: ArrayShape,
    /// Data type.
    pub data_type: DataType,
    /// Chunk (shard) shape.
    pub chunk_shape: ArrayShape,
    /// Chunk key encoding.
    pub chunk_key_encoding: ChunkKeyEncoding,
    /// Fill value.
    pub fill_value: Option<FillValue>,
    /// Array to array codecs.
    pub array_to_array_codecs: Vec<Box<dyn ArrayToArrayCodecTraits>>,
    /// Array to bytes codec.
    pub array_to_bytes_codec: Box<dyn ArrayToBytesCodecTraits>,
    /// Bytes to bytes codecs.
    pub bytes_to_bytes_codecs: Vec<Box<dyn BytesToBytesCodecTraits>>,
    /// Attributes.
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Dimension names.
    pub dimension_names: Option<Vec<Option<String>>>,
    /// The inner chunk shape if the codecs are to be wrapped in a `sharding_indexed` codec.
    pub inner_chunk_shape: Option<ArrayShape>,
}

impl ArrayBuilder {
    /// Create a new array builder for an array.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        data_type: DataType,
        chunk_shape: ArrayShape,
        fill_value: FillValue,
    ) -> Self {
        Self {
            shape,
            data_type,
            chunk_shape,
            chunk_key_encoding: ChunkKeyEncoding::new(DefaultChunkKeyEncoding::default()),
            fill_value: Some(fill_value),
            array_to_array_codecs: Vec::default(),
            array_to_bytes_codec: Box::<BytesCodec>::default(),
            bytes_to_bytes_codecs: Vec::default(),
            attributes: serde_json::Map::default(),
            dimension_names: None,
            inner_chunk_shape: None,
        }
    }

    /// Create a new builder copying the configuration of an existing array.
    #[must_use]
    pub fn from_array<TStorage: ?Sized + ReadableWritableListableStorageTraits>(
        array: &Array<TStorage>,
    ) -> Self {
        let codecs = array.codecs();
        Self {
            shape: array.shape().to_vec(),
            data_type: array.data_type().clone(),
            chunk_shape: array.chunk_shape().to_array_shape(),
            chunk_key_encoding: array.chunk_key_encoding().clone(),
            fill_value: array.fill_value().cloned(),
            array_to_array_codecs: codecs.array_to_array_codecs().to_vec(),
            array_to_bytes_codec: codecs.array_to_bytes_codec().clone(),
            bytes_to_bytes_codecs: codecs.bytes_to_bytes_codecs().to_vec(),
            attributes: array.attributes().clone(),
            dimension_names: array.dimension_names().cloned(),
            inner_chunk_shape: None,
        }
    }

    /// Set the shape.
    pub fn shape(&mut self, shape: ArrayShape) -> &mut Self {
        self.shape = shape;
        self
    }

    /// Set the data type.
    pub fn data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self
    }

    /// Set the chunk (shard) shape.
    pub fn chunk_shape(&mut self, chunk_shape: ArrayShape) -> &mut Self {
        self.chunk_shape = chunk_shape;
        self
    }

    /// Set the fill value, [`None`] for no fill value.
    pub fn fill_value(&mut self, fill_value: Option<FillValue>) -> &mut Self {
        self.fill_value = fill_value;
        self
    }

    /// Set the chunk key encoding.
    ///
    /// If left unmodified, the array will use `default` chunk key encoding with the `/` chunk key separator.
    pub fn chunk_key_encoding(&mut self, chunk_key_encoding: ChunkKeyEncoding) -> &mut Self {
        self.chunk_key_encoding = chunk_key_encoding;
        self
    }

    /// Set the chunk key encoding to default with `separator`.
    pub fn chunk_key_encoding_default_separator(
        &mut self,
        separator: ChunkKeySeparator,
    ) -> &mut Self {
        self.chunk_key_encoding = ChunkKeyEncoding::new(DefaultChunkKeyEncoding::new(separator));
        self
    }

    /// Set the array to array codecs.
    ///
    /// If left unmodified, the array will have no array to array codecs.
    pub fn array_to_array_codecs(
        &mut self,
        array_to_array_codecs: Vec<Box<dyn ArrayToArrayCodecTraits>>,
    ) -> &mut Self {
        self.array_to_array_codecs = array_to_array_codecs;
        self
    }

    /// Set the array to bytes codec.
    ///
    /// If left unmodified, the array will default to using the `bytes` codec with little endian encoding.
    pub fn array_to_bytes_codec(
        &mut self,
        array_to_bytes_codec: Box<dyn ArrayToBytesCodecTraits>,
    ) -> &mut Self {
        self.array_to_bytes_codec = array_to_bytes_codec;
        self
    }

    /// Set the bytes to bytes codecs.
    ///
    /// If left unmodified, the array will have no bytes to bytes codecs.
    pub fn bytes_to_bytes_codecs(
        &mut self,
        bytes_to_bytes_codecs: Vec<Box<dyn BytesToBytesCodecTraits>>,
    ) -> &mut Self {
        self.bytes_to_bytes_codecs = bytes_to_bytes_codecs;
        self
    }

    /// Shard the array with `inner_chunk_shape`, [`None`] to not shard.
    ///
    /// On [`build`](ArrayBuilder::build), the codecs become the inner chunk codecs of a `sharding_indexed` codec with default index codecs.
    pub fn sharding(&mut self, inner_chunk_shape: Option<ArrayShape>) -> &mut Self {
        self.inner_chunk_shape = inner_chunk_shape;
        self
    }

    /// Set the user defined attributes.
    pub fn attributes(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Set the dimension names.
    ///
    /// If left unmodified, all dimension names are "unnamed".
    pub fn dimension_names(&mut self, dimension_names: Option<Vec<Option<String>>>) -> &mut Self {
        self.dimension_names = dimension_names;
        self
    }

    /// Build into an [`Array`].
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCreateError`] if there is an error creating the array.
    /// This can be due to a storage error, an invalid path, or a problem with array configuration.
    pub fn build<TStorage: ?Sized + ReadableWritableListableStorageTraits>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        let chunk_shape = ChunkShape::try_from(self.chunk_shape.clone())
            .map_err(|_| ArrayCreateError::ZeroChunkDimension(self.chunk_shape.clone()))?;
        let codecs = if let Some(inner_chunk_shape) = &self.inner_chunk_shape {
            let inner_chunk_shape = ChunkShape::try_from(inner_chunk_shape.clone())
                .map_err(|_| ArrayCreateError::ZeroChunkDimension(inner_chunk_shape.clone()))?;
            let sharding = ShardingCodecBuilder::new(inner_chunk_shape)
                .array_to_array_codecs(self.array_to_array_codecs.clone())
                .array_to_bytes_codec(self.array_to_bytes_codec.clone())
                .bytes_to_bytes_codecs(self.bytes_to_bytes_codecs.clone())
                .build();
            CodecChain::new(vec![], Box::new(sharding), vec![])
        } else {
            CodecChain::new(
                self.array_to_array_codecs.clone(),
                self.array_to_bytes_codec.clone(),
                self.bytes_to_bytes_codecs.clone(),
            )
        };
        let mut array = Array::new_with_parts(
            storage,
            path,
            self.shape.clone(),
            self.data_type.clone(),
            chunk_shape,
            self.chunk_key_encoding.clone(),
            self.fill_value.clone(),
            codecs,
        )?;
        array.set_attributes(self.attributes.clone());
        array.set_dimension_names(self.dimension_names.clone())?;
        array.metadata_modified = false;
        Ok(array)
    }
}

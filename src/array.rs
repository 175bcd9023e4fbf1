//! Zarr arrays.
//!
//! An array is a node in a Zarr hierarchy used to hold multidimensional array data and associated metadata.
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#array>.
//!
//! Use [`ArrayBuilder`] to setup a new array, or use [`Array::open`] for an existing array.
//! The documentation for [`Array`] details how to interact with arrays.

mod array_builder;
mod array_errors;
mod array_metadata;
mod array_prefetch;
mod array_read;
mod array_write;
mod bytes_representation;
mod chunk_cache;
pub mod chunk_key_encoding;
mod chunk_representation;
mod chunk_shape;
pub mod codec;
mod concurrency;
pub mod data_type;
pub mod element;
mod fill_value;
mod fill_value_metadata;
pub mod overview;

use std::sync::Arc;

use parking_lot::Mutex;

pub use self::{
    array_builder::ArrayBuilder,
    array_errors::{ArrayCreateError, ArrayError},
    array_metadata::{ArrayMetadata, RegularChunkGridConfiguration},
    bytes_representation::BytesRepresentation,
    chunk_key_encoding::{ChunkKeyEncoding, ChunkKeySeparator},
    chunk_representation::{ChunkRepresentation, IncompatibleFillValueError},
    chunk_shape::{ChunkShape, ZeroChunkDimensionError},
    codec::CodecChain,
    data_type::DataType,
    element::Element,
    fill_value::FillValue,
    fill_value_metadata::FillValueMetadata,
};

use self::{
    array_metadata::REGULAR_CHUNK_GRID, chunk_cache::ArrayState, codec::ArrayToBytesCodecTraits,
};
use crate::{
    array_subset::ArraySubset,
    node::NodePath,
    storage::{ReadableWritableListableStorageTraits, StorageError, StoreKey, StoreKeyError},
};

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// A Zarr array.
///
/// ### Metadata
///
/// An array is defined by the following parameters (which are encoded in its JSON metadata):
///  - **shape**: defines the length of the array dimensions,
///  - **data type**: defines the numerical representation array elements,
///  - **chunk grid**: a `regular` grid defining the chunk shape (the *shard* shape of a sharded array),
///  - **chunk key encoding**: defines how chunk grid cell coordinates are mapped to keys in a store,
///  - **fill value**: an element value to use for uninitialised portions of the array (optional),
///  - **codecs**: used to encode and decode chunks,
///
/// and optional **attributes** and **dimension names**.
///
/// ### Blocks
///
/// The unit of caching, reading and writing is a *block*.
/// A block is an *inner chunk* if the array to bytes codec is `sharding_indexed` without preceding array to array codecs, otherwise it is a chunk.
/// Block indices identify blocks in the grid of [`inner_chunk_shape`](Array::inner_chunk_shape).
/// The storage key of a block is that of the chunk (shard) that holds it.
///
/// ### Reading
///
/// Reads take `&self` and may run from several threads:
///  - [`retrieve_chunk`](Array::retrieve_chunk) retrieves a block,
///  - [`retrieve_array_subset`](Array::retrieve_array_subset) / [`retrieve_array_subset_elements`](Array::retrieve_array_subset_elements) retrieve a region.
///
/// A missing chunk is not an error, its elements read as the fill value.
/// [`advise_read`](Array::advise_read) prefetches the blocks of a region into the block cache.
///
/// ### Writing
///
/// Writes take `&mut self`, so an array has a single writer.
/// Written data is held in a *dirty* block until a different block is written or the array is [flushed](Array::flush).
/// A flushed block of a sharded array is placed in an in-memory shard, which is encoded and stored once all of its inner chunks are written or on [`flush`](Array::flush).
/// Chunks with every element equal to the fill value are erased rather than stored.
///
/// [`store_array_subset`](Array::store_array_subset) writes a region aligned to the chunk grid spanning two or more chunks in parallel, bypassing the block cache.
///
/// Dropping an array flushes it, logging any error.
#[derive(Debug)]
pub struct Array<TStorage: ?Sized + ReadableWritableListableStorageTraits> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the array in a store.
    path: NodePath,
    /// An array of integers providing the length of each dimension of the Zarr array.
    shape: ArrayShape,
    /// The data type of the Zarr array.
    data_type: DataType,
    /// The shape of a chunk in the chunk grid.
    chunk_shape: ChunkShape,
    /// The shape of a block, equal to `chunk_shape` unless the array is sharded.
    inner_chunk_shape: ChunkShape,
    /// The mapping from chunk grid cell coordinates to keys in the underlying store.
    chunk_key_encoding: ChunkKeyEncoding,
    /// Provides an element value to use for uninitialised portions of the Zarr array.
    fill_value: Option<FillValue>,
    /// Specifies a list of codecs to be used for encoding and decoding chunks.
    codecs: CodecChain,
    /// Optional user defined attributes.
    attributes: serde_json::Map<String, serde_json::Value>,
    /// An optional list of dimension names.
    dimension_names: Option<Vec<Option<String>>>,
    /// The metadata has changed since it was last stored.
    metadata_modified: bool,
    /// Block cache, current block, shard write cache and chunk presence.
    state: Mutex<ArrayState>,
    /// Paths of overview arrays, discovered lazily.
    overviews: Mutex<Option<Vec<NodePath>>>,
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Array<TStorage> {
    /// Open an existing array in `storage` at `path`. The metadata is read from the store.
    ///
    /// If the [chunk presence cache](crate::config::Config#chunk-presence-cache) is enabled, chunk presence is cached.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if there is a storage error or any metadata is invalid.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        let node_path = NodePath::new(path)?;
        let key = node_path.meta_key()?;
        let metadata = storage
            .get(&key)?
            .ok_or(ArrayCreateError::MissingMetadata)?;
        let metadata: ArrayMetadata = serde_json::from_slice(&metadata)
            .map_err(|err| ArrayCreateError::InvalidMetadata(err.to_string()))?;
        let array = Self::new_with_metadata(storage, path, metadata)?;
        if crate::config::global_config().chunk_presence_cache() {
            array.cache_chunk_presence()?;
        }
        Ok(array)
    }

    /// Create an array in `storage` at `path` with `metadata`.
    /// This does **not** write to the store, use [`store_metadata`](Array::store_metadata) to write `metadata` to `storage`.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if any metadata is invalid.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: &str,
        metadata: ArrayMetadata,
    ) -> Result<Self, ArrayCreateError> {
        let data_type = DataType::from_metadata(&metadata.data_type)?;
        if metadata.chunk_grid.name() != REGULAR_CHUNK_GRID {
            return Err(ArrayCreateError::UnsupportedChunkGrid(
                metadata.chunk_grid.to_string(),
            ));
        }
        let chunk_grid: RegularChunkGridConfiguration = metadata.chunk_grid.to_configuration()?;
        let fill_value = data_type.fill_value_from_metadata(&metadata.fill_value)?;
        let codecs = CodecChain::from_metadata(&metadata.codecs)
            .map_err(ArrayCreateError::CodecsCreateError)?;
        let chunk_key_encoding = ChunkKeyEncoding::from_metadata(&metadata.chunk_key_encoding)
            .map_err(ArrayCreateError::ChunkKeyEncodingCreateError)?;
        let mut array = Self::new_with_parts(
            storage,
            path,
            metadata.shape,
            data_type,
            chunk_grid.chunk_shape,
            chunk_key_encoding,
            fill_value,
            codecs,
        )?;
        array.attributes = metadata.attributes;
        array.set_dimension_names(metadata.dimension_names)?;
        array.metadata_modified = false;
        Ok(array)
    }

    /// Create an array from its validated components.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_with_parts(
        storage: Arc<TStorage>,
        path: &str,
        shape: ArrayShape,
        data_type: DataType,
        chunk_shape: ChunkShape,
        chunk_key_encoding: ChunkKeyEncoding,
        fill_value: Option<FillValue>,
        codecs: CodecChain,
    ) -> Result<Self, ArrayCreateError> {
        let path = NodePath::new(path)?;
        if chunk_shape.len() != shape.len() {
            return Err(ArrayCreateError::InvalidChunkGridDimensionality(
                chunk_shape.len(),
                shape.len(),
            ));
        }
        if let Some(fill_value) = &fill_value {
            if fill_value.size() != data_type.size() {
                return Err(IncompatibleFillValueError::new(data_type.name(), fill_value.clone()).into());
            }
        }
        let inner_chunk_shape = match codecs.inner_chunk_shape() {
            Some(inner_chunk_shape) => {
                let divides = inner_chunk_shape.len() == chunk_shape.len()
                    && std::iter::zip(chunk_shape.iter(), inner_chunk_shape.iter())
                        .all(|(outer, inner)| outer.get() % inner.get() == 0);
                if !divides {
                    return Err(ArrayCreateError::InvalidInnerChunkShape(
                        inner_chunk_shape.to_array_shape(),
                        chunk_shape.to_array_shape(),
                    ));
                }
                inner_chunk_shape.clone()
            }
            None => chunk_shape.clone(),
        };
        let num_blocks: u64 = std::iter::zip(&shape, inner_chunk_shape.iter())
            .map(|(size, inner)| size.div_ceil(inner.get()))
            .product();
        if num_blocks == 0 {
            return Err(ArrayCreateError::NoChunks(
                shape,
                inner_chunk_shape.to_array_shape(),
            ));
        }

        Ok(Self {
            storage,
            path,
            shape,
            data_type,
            chunk_shape,
            inner_chunk_shape,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes: serde_json::Map::default(),
            dimension_names: None,
            metadata_modified: false,
            state: Mutex::new(ArrayState::default()),
            overviews: Mutex::new(None),
        })
    }

    /// Get the underlying storage.
    #[must_use]
    pub fn storage(&self) -> Arc<TStorage> {
        self.storage.clone()
    }

    /// Get the node path.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Get the array dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// Get the data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Get the fill value, [`None`] if the array has no fill value.
    #[must_use]
    pub const fn fill_value(&self) -> Option<&FillValue> {
        self.fill_value.as_ref()
    }

    /// Get the chunk (shard) shape.
    #[must_use]
    pub const fn chunk_shape(&self) -> &ChunkShape {
        &self.chunk_shape
    }

    /// Get the block (inner chunk) shape.
    ///
    /// Equal to the [`chunk_shape`](Array::chunk_shape) unless the array is sharded.
    #[must_use]
    pub const fn inner_chunk_shape(&self) -> &ChunkShape {
        &self.inner_chunk_shape
    }

    /// Returns true if a chunk holds more than one block.
    #[must_use]
    pub fn is_sharded(&self) -> bool {
        self.chunk_shape != self.inner_chunk_shape
    }

    /// Get the codecs.
    #[must_use]
    pub const fn codecs(&self) -> &CodecChain {
        &self.codecs
    }

    /// Get the chunk key encoding.
    #[must_use]
    pub const fn chunk_key_encoding(&self) -> &ChunkKeyEncoding {
        &self.chunk_key_encoding
    }

    /// Get the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    /// Get the dimension names.
    #[must_use]
    pub const fn dimension_names(&self) -> Option<&Vec<Option<String>>> {
        self.dimension_names.as_ref()
    }

    /// Set the fill value. The metadata is rewritten on [`flush`](Array::flush).
    ///
    /// # Errors
    /// Returns [`ArrayCreateError::InvalidFillValue`] if the fill value size does not match the data type.
    pub fn set_fill_value(&mut self, fill_value: Option<FillValue>) -> Result<(), ArrayCreateError> {
        if let Some(fill_value) = &fill_value {
            if fill_value.size() != self.data_type.size() {
                return Err(
                    IncompatibleFillValueError::new(self.data_type.name(), fill_value.clone())
                        .into(),
                );
            }
        }
        self.fill_value = fill_value;
        self.metadata_modified = true;
        Ok(())
    }

    /// Set the attributes. The metadata is rewritten on [`flush`](Array::flush).
    pub fn set_attributes(&mut self, attributes: serde_json::Map<String, serde_json::Value>) {
        self.attributes = attributes;
        self.metadata_modified = true;
    }

    /// Set the dimension names. The metadata is rewritten on [`flush`](Array::flush).
    ///
    /// # Errors
    /// Returns [`ArrayCreateError::InvalidDimensionNames`] if the number of names does not match the array dimensionality.
    pub fn set_dimension_names(
        &mut self,
        dimension_names: Option<Vec<Option<String>>>,
    ) -> Result<(), ArrayCreateError> {
        if let Some(dimension_names) = &dimension_names {
            if dimension_names.len() != self.dimensionality() {
                return Err(ArrayCreateError::InvalidDimensionNames(
                    dimension_names.len(),
                    self.dimensionality(),
                ));
            }
        }
        self.dimension_names = dimension_names;
        self.metadata_modified = true;
        Ok(())
    }

    /// Create the array metadata.
    #[must_use]
    pub fn metadata(&self) -> ArrayMetadata {
        ArrayMetadata::new(
            self.shape.clone(),
            self.data_type.metadata(),
            ArrayMetadata::regular_chunk_grid(&self.chunk_shape),
            self.chunk_key_encoding.create_metadata(),
            self.data_type
                .metadata_fill_value(self.fill_value.as_ref())
                .unwrap_or(FillValueMetadata::Null),
            self.codecs.create_metadatas(),
            self.attributes.clone(),
            self.dimension_names.clone(),
        )
    }

    /// Create an array builder matching the parameters of this array.
    #[must_use]
    pub fn builder(&self) -> ArrayBuilder {
        ArrayBuilder::from_array(self)
    }

    /// Store the array metadata.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&mut self) -> Result<(), StorageError> {
        let key = self.path.meta_key()?;
        let json = serde_json::to_vec_pretty(&self.metadata())
            .map_err(|err| StorageError::Other(err.to_string()))?;
        self.storage.set(&key, json.into())?;
        self.metadata_modified = false;
        Ok(())
    }

    /// The default chunk representation of a chunk (shard).
    pub(crate) fn chunk_representation(&self) -> Result<ChunkRepresentation, ArrayError> {
        Ok(ChunkRepresentation::new(
            self.chunk_shape.clone(),
            self.data_type.clone(),
            self.fill_value_or_zero(),
        )
        .map_err(ArrayCreateError::from)?)
    }

    /// The fill value, or zero if the array has no fill value.
    pub(crate) fn fill_value_or_zero(&self) -> FillValue {
        self.fill_value
            .clone()
            .unwrap_or_else(|| FillValue::zero(self.data_type.size()))
    }

    /// Return the shape of the chunk grid, i.e. the number of chunks (shards) per dimension.
    #[must_use]
    pub fn chunk_grid_shape(&self) -> ArrayShape {
        std::iter::zip(&self.shape, self.chunk_shape.iter())
            .map(|(size, chunk)| size.div_ceil(chunk.get()))
            .collect()
    }

    /// Return the shape of the block grid, i.e. the number of blocks per dimension.
    #[must_use]
    pub fn block_grid_shape(&self) -> ArrayShape {
        std::iter::zip(&self.shape, self.inner_chunk_shape.iter())
            .map(|(size, chunk)| size.div_ceil(chunk.get()))
            .collect()
    }

    /// Return the array subset of the block at `chunk_indices`, which may extend beyond the array bounds.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndicesError`] if `chunk_indices` are out of bounds of the block grid.
    pub fn chunk_subset(&self, chunk_indices: &[u64]) -> Result<ArraySubset, ArrayError> {
        let grid_shape = self.block_grid_shape();
        if chunk_indices.len() != grid_shape.len()
            || std::iter::zip(chunk_indices, &grid_shape).any(|(index, size)| index >= size)
        {
            return Err(ArrayError::InvalidChunkGridIndicesError(
                chunk_indices.to_vec(),
            ));
        }
        let shape = self.inner_chunk_shape.to_array_shape();
        let start = std::iter::zip(chunk_indices, &shape)
            .map(|(index, size)| index * size)
            .collect();
        Ok(ArraySubset::new_with_start_shape(start, shape)?)
    }

    /// The indices of the chunk (shard) holding the block at `chunk_indices`.
    pub(crate) fn shard_indices(&self, chunk_indices: &[u64]) -> ArrayIndices {
        std::iter::zip(
            chunk_indices,
            std::iter::zip(self.chunk_shape.iter(), self.inner_chunk_shape.iter()),
        )
        .map(|(index, (outer, inner))| index / (outer.get() / inner.get()))
        .collect()
    }

    /// The store key of the chunk (shard) at `chunk_indices` of the chunk grid.
    ///
    /// # Errors
    /// Returns a [`StoreKeyError`] if the key is invalid.
    pub fn chunk_key(&self, chunk_indices: &[u64]) -> Result<StoreKey, StoreKeyError> {
        StoreKey::new(format!(
            "{}{}",
            self.path.store_prefix()?.as_str(),
            self.chunk_key_encoding.encode(chunk_indices)
        ))
    }

    /// Validate that `array_subset` is within the bounds of the array.
    fn validate_array_subset(&self, array_subset: &ArraySubset) -> Result<(), ArrayError> {
        if array_subset.dimensionality() == self.dimensionality()
            && array_subset.inbounds(&self.shape)
        {
            Ok(())
        } else {
            Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.shape.clone(),
            ))
        }
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Drop for Array<TStorage> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let pending = state.current.as_ref().is_some_and(|current| current.dirty)
            || !state.shard_writes.is_empty()
            || self.metadata_modified;
        if pending {
            if let Err(err) = self.flush() {
                log::error!("failed to flush array {}: {err}", self.path);
            }
        }
    }
}

/// Unravel a linearised index to ND indices.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &[u64]) -> ArrayIndices {
    let mut indices = vec![0; shape.len()];
    for (indices_i, &dim) in std::iter::zip(indices.iter_mut().rev(), shape.iter().rev()) {
        *indices_i = index % dim;
        index /= dim;
    }
    indices
}

/// Ravel ND indices to a linearised index.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

#[cfg(test)]
mod tests {
    use crate::storage::store::MemoryStore;

    use super::*;

    #[test]
    fn ravel_unravel() {
        let shape = [3, 4, 5];
        assert_eq!(ravel_indices(&[1, 2, 3], &shape), 1 * 20 + 2 * 5 + 3);
        assert_eq!(unravel_index(33, &shape), vec![1, 2, 3]);
        assert_eq!(unravel_index(0, &[]), Vec::<u64>::new());
    }

    #[test]
    fn array_metadata_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let json = r#"{
            "zarr_format": 3,
            "node_type": "array",
            "shape": [10, 9],
            "data_type": "int16",
            "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [4, 6]}},
            "chunk_key_encoding": {"name": "default", "configuration": {"separator": "."}},
            "fill_value": -1,
            "codecs": [
                {"name": "sharding_indexed", "configuration": {
                    "chunk_shape": [2, 3],
                    "codecs": [{"name": "bytes", "configuration": {"endian": "big"}}],
                    "index_codecs": [{"name": "bytes", "configuration": {"endian": "little"}}],
                    "index_location": "end"
                }}
            ],
            "attributes": {"key": "value"},
            "dimension_names": ["y", "x"]
        }"#;
        let metadata: ArrayMetadata = serde_json::from_str(json).unwrap();
        let mut array = Array::new_with_metadata(store.clone(), "/array", metadata.clone()).unwrap();
        assert_eq!(array.chunk_shape().to_array_shape(), vec![4, 6]);
        assert_eq!(array.inner_chunk_shape().to_array_shape(), vec![2, 3]);
        assert!(array.is_sharded());
        assert_eq!(array.chunk_grid_shape(), vec![3, 2]);
        assert_eq!(array.block_grid_shape(), vec![5, 3]);
        assert_eq!(array.shard_indices(&[3, 2]), vec![1, 1]);
        assert_eq!(array.chunk_key(&[1, 1]).unwrap().as_str(), "array/c.1.1");
        assert_eq!(array.fill_value(), Some(&FillValue::from(-1i16)));
        assert_eq!(array.metadata(), metadata);
        array.store_metadata().unwrap();

        let array = Array::open(store, "/array").unwrap();
        assert_eq!(array.metadata(), metadata);
        assert_eq!(
            array.chunk_subset(&[4, 2]).unwrap(),
            ArraySubset::new_with_ranges(&[8..10, 6..9])
        );
        assert!(array.chunk_subset(&[5, 0]).is_err());
    }

    #[test]
    fn array_invalid_inner_chunk_shape() {
        let store = Arc::new(MemoryStore::new());
        let json = r#"{
            "zarr_format": 3,
            "node_type": "array",
            "shape": [10],
            "data_type": "uint8",
            "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [5]}},
            "chunk_key_encoding": {"name": "default"},
            "fill_value": 0,
            "codecs": [
                {"name": "sharding_indexed", "configuration": {
                    "chunk_shape": [2],
                    "codecs": [{"name": "bytes"}],
                    "index_codecs": [{"name": "bytes", "configuration": {"endian": "little"}}]
                }}
            ]
        }"#;
        let metadata: ArrayMetadata = serde_json::from_str(json).unwrap();
        assert!(matches!(
            Array::new_with_metadata(store, "/array", metadata),
            Err(ArrayCreateError::InvalidInnerChunkShape(_, _))
        ));
    }

    #[test]
    fn array_no_chunks() {
        let store = Arc::new(MemoryStore::new());
        let result = ArrayBuilder::new(vec![0, 10], DataType::UInt8, vec![2, 2], FillValue::from(0u8))
            .build(store, "/array");
        assert!(matches!(result, Err(ArrayCreateError::NoChunks(_, _))));
    }

    #[test]
    fn array_missing_metadata() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            Array::open(store, "/array"),
            Err(ArrayCreateError::MissingMetadata)
        ));
    }
}

use thiserror::Error;

use crate::{
    array_subset::{ArrayStoreBytesError, ArraySubset, IncompatibleDimensionalityError},
    metadata::ConfigurationInvalidError,
    node::NodePathError,
    plugin::PluginCreateError,
    storage::{StorageError, StoreKeyError},
};

use super::{
    codec::CodecError,
    data_type::{IncompatibleFillValueMetadataError, UnsupportedDataTypeError},
    ArrayIndices, ArrayShape, DataType, IncompatibleFillValueError,
};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// An invalid store key.
    #[error(transparent)]
    StoreKeyError(#[from] StoreKeyError),
    /// Invalid array metadata.
    #[error("invalid array metadata: {0}")]
    InvalidMetadata(String),
    /// Unsupported data type.
    #[error(transparent)]
    DataTypeCreateError(#[from] UnsupportedDataTypeError),
    /// Invalid fill value metadata.
    #[error(transparent)]
    InvalidFillValueMetadata(#[from] IncompatibleFillValueMetadataError),
    /// Invalid fill value.
    #[error(transparent)]
    InvalidFillValue(#[from] IncompatibleFillValueError),
    /// Error creating codecs.
    #[error(transparent)]
    CodecsCreateError(PluginCreateError),
    /// Chunk key encoding create error.
    #[error(transparent)]
    ChunkKeyEncodingCreateError(PluginCreateError),
    /// The chunk grid is not supported.
    #[error("unsupported chunk grid {0}")]
    UnsupportedChunkGrid(String),
    /// The chunk grid configuration is invalid.
    #[error(transparent)]
    ChunkGridConfigurationInvalid(#[from] ConfigurationInvalidError),
    /// The dimensionality of the chunk grid does not match the array shape.
    #[error("chunk grid dimensionality {0} does not match array dimensionality {1}")]
    InvalidChunkGridDimensionality(usize, usize),
    /// A chunk shape has a zero dimension.
    #[error("chunk shape {0:?} has a zero dimension")]
    ZeroChunkDimension(ArrayShape),
    /// The inner chunk shape of a sharded array does not evenly divide its chunk shape.
    #[error("inner chunk shape {0:?} does not evenly divide chunk shape {1:?}")]
    InvalidInnerChunkShape(ArrayShape, ArrayShape),
    /// The array has no chunks.
    #[error("array with shape {0:?} and inner chunk shape {1:?} has no chunks")]
    NoChunks(ArrayShape, ArrayShape),
    /// The number of dimension names does not match the array dimensionality.
    #[error("the number of dimension names {0} does not match array dimensionality {1}")]
    InvalidDimensionNames(usize, usize),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// Missing metadata.
    #[error("array metadata is missing")]
    MissingMetadata,
}

/// Array errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid store key.
    #[error(transparent)]
    StoreKeyError(#[from] StoreKeyError),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// Invalid chunk grid indices.
    #[error("invalid chunk grid indices: {_0:?}")]
    InvalidChunkGridIndicesError(ArrayIndices),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// Incompatible array subset.
    #[error("array subset {_0} is not compatible with array shape {_1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// An array subset could not be stored.
    #[error(transparent)]
    ArrayStoreBytesError(#[from] ArrayStoreBytesError),
    /// An unexpected bytes input size.
    #[error("got bytes with size {_0:?}, expected {_1:?}")]
    InvalidBytesInputSize(usize, u64),
    /// The element type does not match the data type and cannot be converted.
    #[error("elements of data type {_0} cannot be converted to data type {_1}")]
    IncompatibleElementType(DataType, DataType),
    /// Invalid element value.
    ///
    /// For example, a bool array with a value not equal to 0 (false) or 1 (true).
    #[error("invalid element value")]
    InvalidElementValue,
    /// A write operation was attempted on an array in a read only store.
    #[error("array is read only")]
    ReadOnly,
    /// A worker of a parallel operation failed without recording an error.
    #[error("a parallel operation was aborted")]
    Aborted,
    /// Invalid array metadata.
    #[error(transparent)]
    ArrayCreateError(#[from] Box<ArrayCreateError>),
}

impl From<ArrayCreateError> for ArrayError {
    fn from(err: ArrayCreateError) -> Self {
        Self::ArrayCreateError(Box::new(err))
    }
}

use std::num::NonZeroU64;

use derive_more::Display;
use thiserror::Error;

use super::{ArrayShape, ChunkShape, DataType, FillValue};

/// The shape, data type, and fill value of a chunk.
///
/// Chunks without a fill value in their array metadata carry a zero fill value.
#[derive(Clone, Debug, Display)]
#[display("{shape:?} {data_type} {fill_value}")]
pub struct ChunkRepresentation {
    shape: ChunkShape,
    data_type: DataType,
    fill_value: FillValue,
}

/// The fill value size does not match the data type size.
#[derive(Clone, Debug, Error)]
#[error("fill value {fill_value} is incompatible with data type {data_type}")]
pub struct IncompatibleFillValueError {
    data_type: String,
    fill_value: FillValue,
}

impl IncompatibleFillValueError {
    /// Create a new incompatible fill value error.
    #[must_use]
    pub fn new(data_type: String, fill_value: FillValue) -> Self {
        Self {
            data_type,
            fill_value,
        }
    }
}

impl ChunkRepresentation {
    /// Create a new [`ChunkRepresentation`].
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleFillValueError`] if the `data_type` and `fill_value` are incompatible.
    pub fn new(
        shape: ChunkShape,
        data_type: DataType,
        fill_value: FillValue,
    ) -> Result<Self, IncompatibleFillValueError> {
        if data_type.size() == fill_value.size() {
            Ok(Self {
                shape,
                data_type,
                fill_value,
            })
        } else {
            Err(IncompatibleFillValueError::new(data_type.name(), fill_value))
        }
    }

    /// Return the shape of the chunk.
    #[must_use]
    pub fn shape(&self) -> &[NonZeroU64] {
        &self.shape
    }

    /// Return the shape of the chunk as an [`ArrayShape`].
    #[must_use]
    pub fn shape_u64(&self) -> ArrayShape {
        self.shape.to_array_shape()
    }

    /// Return the dimensionality of the chunk.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// Return the number of elements in the chunk.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.num_elements()
    }

    /// Return the number of elements in the chunk as a usize.
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        self.shape.num_elements_usize()
    }

    /// Return the data type of the chunk.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Return the fill value of the chunk.
    #[must_use]
    pub const fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// Return the element size of the chunk in bytes.
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.data_type.size()
    }

    /// Return the size of the decoded chunk in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.num_elements() * self.data_type.size() as u64
    }

    /// Return the size of the decoded chunk in bytes as a usize.
    #[must_use]
    pub fn size_usize(&self) -> usize {
        self.num_elements_usize() * self.data_type.size()
    }

    /// Return a chunk filled with the fill value.
    #[must_use]
    pub fn fill_bytes(&self) -> Vec<u8> {
        self.fill_value.repeat(self.num_elements_usize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_representation() {
        let representation = ChunkRepresentation::new(
            vec![2, 3].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(7u16),
        )
        .unwrap();
        assert_eq!(representation.num_elements(), 6);
        assert_eq!(representation.size(), 12);
        assert_eq!(representation.shape_u64(), vec![2, 3]);
        assert!(representation
            .fill_value()
            .equals_all(&representation.fill_bytes()));
        assert!(ChunkRepresentation::new(
            vec![2].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(7u8)
        )
        .is_err());
    }
}

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ArrayShape;

/// The shape of a chunk. All dimensions must be non-zero.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ChunkShape(Vec<NonZeroU64>);

/// A zero chunk dimension error.
#[derive(Copy, Clone, Debug, Error)]
#[error("chunk shapes must not contain a zero dimension")]
pub struct ZeroChunkDimensionError;

impl ChunkShape {
    /// Return the number of elements.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.0.iter().copied().map(NonZeroU64::get).product::<u64>()
    }

    /// Return the number of elements as a usize.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        self.num_elements() as usize
    }

    /// Return the chunk shape as an [`ArrayShape`] ([`Vec<u64>`]).
    #[must_use]
    pub fn to_array_shape(&self) -> ArrayShape {
        self.0.iter().copied().map(NonZeroU64::get).collect()
    }
}

impl From<Vec<NonZeroU64>> for ChunkShape {
    fn from(value: Vec<NonZeroU64>) -> Self {
        Self(value)
    }
}

impl TryFrom<Vec<u64>> for ChunkShape {
    type Error = ZeroChunkDimensionError;

    fn try_from(value: Vec<u64>) -> Result<Self, Self::Error> {
        value
            .into_iter()
            .map(NonZeroU64::new)
            .collect::<Option<Vec<_>>>()
            .map(Self)
            .ok_or(ZeroChunkDimensionError)
    }
}

impl TryFrom<&[u64]> for ChunkShape {
    type Error = ZeroChunkDimensionError;

    fn try_from(value: &[u64]) -> Result<Self, Self::Error> {
        Self::try_from(value.to_vec())
    }
}

impl std::ops::Deref for ChunkShape {
    type Target = Vec<NonZeroU64>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_shape() {
        let chunk_shape = ChunkShape::try_from(vec![2, 3, 4]).unwrap();
        assert_eq!(chunk_shape.num_elements(), 24);
        assert_eq!(chunk_shape.to_array_shape(), vec![2, 3, 4]);
        assert!(ChunkShape::try_from(vec![2, 0]).is_err());
        assert_eq!(ChunkShape::try_from(Vec::<u64>::new()).unwrap().num_elements(), 1);
    }
}

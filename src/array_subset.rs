//! Array subsets.
//!
//! An [`ArraySubset`] is a hyper-rectangular region of an array (or of a chunk grid).
//! It is used throughout this library to describe the region of a read or write, the overlap of a region with a chunk, and the chunks intersecting a region.
//!
//! This module also provides the strided N-dimensional copy used to move a region of elements between two row-major (C order) buffers of different shapes.

mod indices_iterator;

pub use indices_iterator::IndicesIterator;

use std::ops::Range;

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

use crate::array::{ArrayIndices, ArrayShape};

/// An array subset.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: ArrayIndices,
    /// The shape of the array subset.
    shape: ArrayShape,
}

/// An array extract bytes error.
#[derive(Debug, Error)]
#[error("array subset {_0} is incompatible with array of shape {_1:?} and element size {_2}")]
pub struct ArrayExtractBytesError(ArraySubset, ArrayShape, usize);

impl ArrayExtractBytesError {
    /// Create a new array extract bytes error.
    #[must_use]
    pub fn new(array_subset: ArraySubset, array_shape: ArrayShape, element_size: usize) -> Self {
        Self(array_subset, array_shape, element_size)
    }
}

/// An array store bytes error.
#[derive(Debug, Error)]
pub enum ArrayStoreBytesError {
    /// Invalid array shape.
    #[error("array shape {_1:?} is incompatible with array subset {_0}")]
    InvalidArrayShape(ArraySubset, ArrayShape),
    /// Invalid subset bytes.
    #[error("expected subset bytes to have length {_1}, got {_0}")]
    InvalidSubsetBytes(usize, usize),
    /// Invalid array bytes.
    #[error("expected array bytes to have length {_1}, got {_0}")]
    InvalidArrayBytes(usize, usize),
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

impl ArraySubset {
    /// Create a new array subset from a list of [`Range`]s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(shape.len(), start.len()))
        }
    }

    /// Create a new array subset from a start and end (exclusive).
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` and `end` do not match.
    pub fn new_with_start_end_exc(
        start: ArrayIndices,
        end: ArrayIndices,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == end.len() {
            let shape = std::iter::zip(&start, end)
                .map(|(&start, end)| end.saturating_sub(start))
                .collect();
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(end.len(), start.len()))
        }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&size| size == 0)
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the array subset as a list of ranges.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<Range<u64>> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(&start, &size)| start..start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the number of elements of the array subset as a `usize`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        self.num_elements() as usize
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        if self.dimensionality() != array_shape.len() {
            return false;
        }
        izip!(&self.start, &self.shape, array_shape)
            .all(|(start, size, array_size)| start + size <= *array_size)
    }

    /// Return the overlapping subset between this array subset and `subset_other`.
    ///
    /// The result is empty if they do not intersect.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `subset_other` does not match the dimensionality of this array subset.
    pub fn overlap(&self, subset_other: &Self) -> Result<Self, IncompatibleDimensionalityError> {
        if subset_other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                subset_other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let mut start = Vec::with_capacity(self.dimensionality());
        let mut shape = Vec::with_capacity(self.dimensionality());
        for (start_a, size_a, start_b, size_b) in izip!(
            &self.start,
            &self.shape,
            &subset_other.start,
            &subset_other.shape
        ) {
            let overlap_start = *start_a.max(start_b);
            let overlap_end = (start_a + size_a).min(start_b + size_b);
            start.push(overlap_start);
            shape.push(overlap_end.saturating_sub(overlap_start));
        }
        Ok(Self { start, shape })
    }

    /// Return this array subset relative to `start`.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` does not match the dimensionality of this array subset.
    pub fn relative_to(&self, start: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                start.len(),
                self.dimensionality(),
            ));
        }
        Ok(Self {
            start: std::iter::zip(&self.start, start)
                .map(|(subset_start, start)| subset_start.saturating_sub(*start))
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Return the subset of the chunk grid with `chunk_shape` covering this array subset.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the length of `chunk_shape` does not match the dimensionality of this array subset.
    pub fn chunks(&self, chunk_shape: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if chunk_shape.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                chunk_shape.len(),
                self.dimensionality(),
            ));
        }
        if self.is_empty() {
            return Ok(Self::new_with_shape(vec![0; self.dimensionality()]));
        }
        let start = std::iter::zip(&self.start, chunk_shape)
            .map(|(start, chunk_size)| start / chunk_size)
            .collect();
        let end = izip!(&self.start, &self.shape, chunk_shape)
            .map(|(start, size, chunk_size)| (start + size - 1) / chunk_size + 1)
            .collect();
        Self::new_with_start_end_exc(start, end)
    }

    /// Returns an iterator over the indices of elements within the subset, in C order.
    #[must_use]
    pub fn indices(&self) -> IndicesIterator {
        IndicesIterator::new(self.clone())
    }

    /// Return the bytes in this array subset from an array with shape `array_shape` and `element_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayExtractBytesError`] if the length of `array_shape` does not match the array subset dimensionality, the array subset is outside of the bounds of `array_shape`, or `bytes` has the wrong length.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, ArrayExtractBytesError> {
        if bytes.len() as u64 == array_shape.iter().product::<u64>() * element_size as u64
            && self.inbounds(array_shape)
        {
            let mut bytes_subset = vec![0; self.num_elements_usize() * element_size];
            copy_subarray(
                bytes,
                array_shape,
                &self.start,
                &mut bytes_subset,
                &self.shape,
                &vec![0; self.dimensionality()],
                &self.shape,
                element_size,
            );
            Ok(bytes_subset)
        } else {
            Err(ArrayExtractBytesError(
                self.clone(),
                array_shape.to_vec(),
                element_size,
            ))
        }
    }

    /// Store `bytes_subset` corresponding to the bytes of this array subset into `bytes` of an array with shape `array_shape` and `element_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayStoreBytesError`] if the array subset is outside of the bounds of `array_shape` or the length of either byte slice is wrong.
    pub fn store_bytes(
        &self,
        bytes_subset: &[u8],
        bytes: &mut [u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<(), ArrayStoreBytesError> {
        if !self.inbounds(array_shape) {
            return Err(ArrayStoreBytesError::InvalidArrayShape(
                self.clone(),
                array_shape.to_vec(),
            ));
        }
        let expected_subset = self.num_elements_usize() * element_size;
        if bytes_subset.len() != expected_subset {
            return Err(ArrayStoreBytesError::InvalidSubsetBytes(
                bytes_subset.len(),
                expected_subset,
            ));
        }
        #[allow(clippy::cast_possible_truncation)]
        let expected_array = array_shape.iter().product::<u64>() as usize * element_size;
        if bytes.len() != expected_array {
            return Err(ArrayStoreBytesError::InvalidArrayBytes(
                bytes.len(),
                expected_array,
            ));
        }
        copy_subarray(
            bytes_subset,
            &self.shape,
            &vec![0; self.dimensionality()],
            bytes,
            array_shape,
            &self.start,
            &self.shape,
            element_size,
        );
        Ok(())
    }
}

/// Row-major byte strides of an array with `shape` and `element_size`.
fn byte_strides(shape: &[u64], element_size: usize) -> Vec<usize> {
    let mut strides = vec![element_size; shape.len()];
    for dim in (0..shape.len().saturating_sub(1)).rev() {
        #[allow(clippy::cast_possible_truncation)]
        let size = shape[dim + 1] as usize;
        strides[dim] = strides[dim + 1] * size;
    }
    strides
}

/// Copy a region of shape `region_shape` starting at `src_start` in `src` (an array of `src_shape`) to `dst_start` in `dst` (an array of `dst_shape`).
///
/// The innermost dimension is copied as a contiguous run and the outer dimensions are walked with an odometer, so the rank can be arbitrary.
/// Callers must ensure the region lies within both arrays.
#[allow(clippy::too_many_arguments, clippy::cast_possible_truncation)]
pub(crate) fn copy_subarray(
    src: &[u8],
    src_shape: &[u64],
    src_start: &[u64],
    dst: &mut [u8],
    dst_shape: &[u64],
    dst_start: &[u64],
    region_shape: &[u64],
    element_size: usize,
) {
    let rank = region_shape.len();
    if rank == 0 {
        dst[..element_size].copy_from_slice(&src[..element_size]);
        return;
    }
    if region_shape.iter().any(|&size| size == 0) {
        return;
    }
    debug_assert_eq!(src_shape.len(), rank);
    debug_assert_eq!(dst_shape.len(), rank);

    let src_strides = byte_strides(src_shape, element_size);
    let dst_strides = byte_strides(dst_shape, element_size);
    let run = region_shape[rank - 1] as usize * element_size;
    let mut counter = vec![0u64; rank - 1];
    loop {
        let mut src_offset = src_start[rank - 1] as usize * element_size;
        let mut dst_offset = dst_start[rank - 1] as usize * element_size;
        for dim in 0..rank - 1 {
            src_offset += (src_start[dim] + counter[dim]) as usize * src_strides[dim];
            dst_offset += (dst_start[dim] + counter[dim]) as usize * dst_strides[dim];
        }
        dst[dst_offset..dst_offset + run].copy_from_slice(&src[src_offset..src_offset + run]);

        let mut dim = rank - 1;
        loop {
            if dim == 0 {
                return;
            }
            dim -= 1;
            counter[dim] += 1;
            if counter[dim] < region_shape[dim] {
                break;
            }
            counter[dim] = 0;
        }
    }
}

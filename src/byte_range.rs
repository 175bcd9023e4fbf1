//! Byte ranges.
//!
//! Stores serve ranged reads of a value with [`ByteRange`]s.
//! The sharding codec uses them to fetch a shard index and the encoded inner chunks it points at.

use std::ops::Range;

use thiserror::Error;

/// A byte range anchored at the start or the end of a value.
///
/// The second field is the length of the range.
/// A [`None`] length extends the range to the opposite end of the value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ByteRange {
    /// An offset from the start of a value and an optional length.
    FromStart(u64, Option<u64>),
    /// An offset back from the end of a value and an optional length.
    FromEnd(u64, Option<u64>),
}

impl ByteRange {
    /// The offset and optional length of the range.
    const fn parts(&self) -> (u64, Option<u64>) {
        match *self {
            Self::FromStart(offset, length) | Self::FromEnd(offset, length) => (offset, length),
        }
    }

    /// Return the absolute range of the byte range in a value of `size` bytes.
    ///
    /// Bounds saturate at zero, use [`resolve`](Self::resolve) to check the range first.
    #[must_use]
    pub fn to_range(&self, size: u64) -> Range<u64> {
        match *self {
            Self::FromStart(offset, length) => offset..length.map_or(size, |length| offset + length),
            Self::FromEnd(offset, length) => {
                let end = size.saturating_sub(offset);
                length.map_or(0, |length| end.saturating_sub(length))..end
            }
        }
    }

    /// Return the start of the byte range in a value of `size` bytes.
    #[must_use]
    pub fn start(&self, size: u64) -> u64 {
        self.to_range(size).start
    }

    /// Return the number of bytes covered in a value of `size` bytes.
    #[must_use]
    pub fn length(&self, size: u64) -> u64 {
        let (offset, length) = self.parts();
        length.unwrap_or_else(|| size.saturating_sub(offset))
    }

    /// Returns true if the byte range lies within a value of `size` bytes.
    #[must_use]
    pub fn is_within(&self, size: u64) -> bool {
        let (offset, length) = self.parts();
        offset
            .checked_add(length.unwrap_or(0))
            .is_some_and(|extent| extent <= size)
    }

    /// Resolve the absolute range of the byte range in a value of `size` bytes.
    ///
    /// # Errors
    /// Returns [`InvalidByteRangeError`] if the byte range extends past either end of the value.
    pub fn resolve(&self, size: u64) -> Result<Range<u64>, InvalidByteRangeError> {
        if self.is_within(size) {
            Ok(self.to_range(size))
        } else {
            Err(InvalidByteRangeError::new(*self, size))
        }
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = |length: Option<u64>| length.map_or_else(|| "*".to_string(), |l| l.to_string());
        match *self {
            Self::FromStart(offset, len) => write!(f, "+{offset}:{}", length(len)),
            Self::FromEnd(offset, len) => write!(f, "-{offset}:{}", length(len)),
        }
    }
}

/// A byte range extends beyond a value.
#[derive(Copy, Clone, Debug, Error)]
#[error("byte range {byte_range} is out of bounds for a value of {size} bytes")]
pub struct InvalidByteRangeError {
    byte_range: ByteRange,
    size: u64,
}

impl InvalidByteRangeError {
    /// Create a new [`InvalidByteRangeError`].
    #[must_use]
    pub fn new(byte_range: ByteRange, size: u64) -> Self {
        Self { byte_range, size }
    }
}

/// Copy each of `byte_ranges` out of `bytes`.
///
/// # Errors
/// Returns [`InvalidByteRangeError`] if a byte range is not within `bytes`.
pub fn extract_byte_ranges(
    bytes: &[u8],
    byte_ranges: &[ByteRange],
) -> Result<Vec<Vec<u8>>, InvalidByteRangeError> {
    byte_ranges
        .iter()
        .map(|byte_range| {
            let range = byte_range.resolve(bytes.len() as u64)?;
            #[allow(clippy::cast_possible_truncation)]
            Ok(bytes[range.start as usize..range.end as usize].to_vec())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_bounds() {
        assert_eq!(ByteRange::FromStart(1, None).to_range(10), 1..10);
        assert_eq!(ByteRange::FromStart(1, Some(5)).to_range(10), 1..6);
        assert_eq!(ByteRange::FromEnd(1, None).to_range(10), 0..9);
        assert_eq!(ByteRange::FromEnd(0, Some(4)).to_range(10), 6..10);
        assert_eq!(ByteRange::FromEnd(2, Some(3)).start(10), 5);
        assert_eq!(ByteRange::FromEnd(1, None).length(10), 9);
        assert_eq!(ByteRange::FromStart(1, Some(5)).length(10), 5);

        assert!(ByteRange::FromStart(1, Some(5)).is_within(6));
        assert!(!ByteRange::FromStart(1, Some(5)).is_within(5));
        assert!(ByteRange::FromEnd(1, Some(5)).is_within(6));
        assert!(!ByteRange::FromStart(u64::MAX, Some(1)).is_within(u64::MAX));
        assert!(ByteRange::FromEnd(4, None).resolve(3).is_err());
    }

    #[test]
    fn byte_range_extract() {
        let bytes = extract_byte_ranges(
            &[1, 2, 3, 4],
            &[ByteRange::FromStart(1, Some(2)), ByteRange::FromEnd(0, Some(1))],
        )
        .unwrap();
        assert_eq!(bytes, vec![vec![2, 3], vec![4]]);
        assert!(extract_byte_ranges(&[1, 2, 3], &[ByteRange::FromStart(1, Some(4))]).is_err());
    }

    #[test]
    fn byte_range_display() {
        assert_eq!(ByteRange::FromStart(0, Some(4)).to_string(), "+0:4");
        assert_eq!(ByteRange::FromEnd(16, None).to_string(), "-16:*");
    }
}

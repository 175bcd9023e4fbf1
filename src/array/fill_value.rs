//! Fill values.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#fill-value>.

use half::f16;
use num::complex::Complex;

/// The fill value ("nodata") of an array.
///
/// Holds the native byte representation of one element. It fills newly created shard buffers and stands in for chunks whose backing value is absent.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for FillValue {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        Self(vec![u8::from(value)])
    }
}

macro_rules! fill_value_from_ne_bytes {
    ( $( $t:ty ),* ) => {
        $(
            impl From<$t> for FillValue {
                fn from(value: $t) -> Self {
                    Self(value.to_ne_bytes().to_vec())
                }
            }
        )*
    };
}

fill_value_from_ne_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f16, f32, f64);

impl From<Complex<f32>> for FillValue {
    fn from(value: Complex<f32>) -> Self {
        let mut bytes = value.re.to_ne_bytes().to_vec();
        bytes.extend(value.im.to_ne_bytes());
        Self(bytes)
    }
}

impl From<Complex<f64>> for FillValue {
    fn from(value: Complex<f64>) -> Self {
        let mut bytes = value.re.to_ne_bytes().to_vec();
        bytes.extend(value.im.to_ne_bytes());
        Self(bytes)
    }
}

impl FillValue {
    /// Create a new fill value composed of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// A fill value of `size` zero bytes.
    #[must_use]
    pub fn zero(size: usize) -> Self {
        Self(vec![0; size])
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `num_elements` repetitions of the fill value.
    #[must_use]
    pub fn repeat(&self, num_elements: usize) -> Vec<u8> {
        self.0.repeat(num_elements)
    }

    /// Check if every element of `bytes` is equal to the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        match self.0.len() {
            0 => bytes.is_empty(),
            1 => {
                let fill = self.0[0];
                bytes.iter().all(|&byte| byte == fill)
            }
            size => {
                bytes.len() % size == 0
                    && bytes.chunks_exact(size).all(|element| element == self.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value_equals_all() {
        let fill_value = FillValue::from(1u16);
        let bytes: Vec<u8> = [1u16, 1, 1].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert!(fill_value.equals_all(&bytes));
        let bytes: Vec<u8> = [1u16, 2, 1].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert!(!fill_value.equals_all(&bytes));
        assert!(FillValue::zero(1).equals_all(&[0, 0, 0]));
        assert!(!FillValue::zero(1).equals_all(&[0, 1]));
    }

    #[test]
    fn fill_value_repeat() {
        let fill_value = FillValue::from(Complex::<f32>::new(1.0, 2.0));
        assert_eq!(fill_value.size(), 8);
        assert_eq!(fill_value.repeat(3).len(), 24);
        assert_eq!(FillValue::from(true).as_ne_bytes(), &[1]);
    }
}

//! Array elements and element type conversion.
//!
//! An [`Element`] is a Rust type that can be read from or written to an array.
//! Typed reads and writes convert between the data type of the element and the data type of the array when both are real numeric types (including `bool`).
//! Conversions to integer types round to the nearest integer and saturate at the bounds of the type, and NaN converts to zero.
//! Complex, string and time data types require an exact match.

use half::f16;
use num::complex::Complex;

use super::{ArrayError, DataType};

/// A trait representing an array element type.
pub trait Element: Sized + Copy + Send + Sync + 'static {
    /// The data type that matches this element exactly.
    fn data_type() -> DataType;

    /// Returns true if elements are stored in an array of `data_type` without conversion.
    fn matches_data_type(data_type: &DataType) -> bool {
        data_type == &Self::data_type()
    }

    /// Convert a slice of elements into native endian bytes.
    fn into_element_bytes(elements: &[Self]) -> Vec<u8>;

    /// Convert native endian bytes into elements.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesInputSize`] if `bytes` is not a whole number of elements or [`ArrayError::InvalidElementValue`] if an element is invalid.
    fn from_element_bytes(bytes: &[u8]) -> Result<Vec<Self>, ArrayError>;
}

impl Element for bool {
    fn data_type() -> DataType {
        DataType::Bool
    }

    fn into_element_bytes(elements: &[Self]) -> Vec<u8> {
        elements.iter().map(|&element| u8::from(element)).collect()
    }

    fn from_element_bytes(bytes: &[u8]) -> Result<Vec<Self>, ArrayError> {
        bytes
            .iter()
            .map(|&byte| match byte {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(ArrayError::InvalidElementValue),
            })
            .collect()
    }
}

macro_rules! impl_element_pod {
    ($raw_type:ty, $data_type:expr, $pattern:pat) => {
        impl Element for $raw_type {
            fn data_type() -> DataType {
                $data_type
            }

            fn matches_data_type(data_type: &DataType) -> bool {
                matches!(data_type, $pattern)
            }

            fn into_element_bytes(elements: &[Self]) -> Vec<u8> {
                bytemuck::cast_slice(elements).to_vec()
            }

            fn from_element_bytes(bytes: &[u8]) -> Result<Vec<Self>, ArrayError> {
                let size = core::mem::size_of::<Self>();
                if bytes.len() % size == 0 {
                    Ok(bytemuck::pod_collect_to_vec(bytes))
                } else {
                    Err(ArrayError::InvalidBytesInputSize(
                        bytes.len(),
                        (bytes.len() / size * size) as u64,
                    ))
                }
            }
        }
    };
}

impl_element_pod!(i8, DataType::Int8, DataType::Int8);
impl_element_pod!(i16, DataType::Int16, DataType::Int16);
impl_element_pod!(i32, DataType::Int32, DataType::Int32);
impl_element_pod!(
    i64,
    DataType::Int64,
    DataType::Int64 | DataType::NumpyDateTime64 { .. } | DataType::NumpyTimeDelta64 { .. }
);
impl_element_pod!(u8, DataType::UInt8, DataType::UInt8);
impl_element_pod!(u16, DataType::UInt16, DataType::UInt16);
impl_element_pod!(u32, DataType::UInt32, DataType::UInt32);
impl_element_pod!(u64, DataType::UInt64, DataType::UInt64);
impl_element_pod!(f16, DataType::Float16, DataType::Float16);
impl_element_pod!(f32, DataType::Float32, DataType::Float32);
impl_element_pod!(f64, DataType::Float64, DataType::Float64);
impl_element_pod!(Complex<f32>, DataType::Complex64, DataType::Complex64);
impl_element_pod!(Complex<f64>, DataType::Complex128, DataType::Complex128);

/// A real number decoded from one element.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Real {
    Int(i128),
    Float(f64),
}

impl Real {
    fn to_i128(self) -> i128 {
        match self {
            Self::Int(value) => value,
            Self::Float(value) if value.is_nan() => 0,
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(value) => value.round() as i128,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

/// Returns true if `data_type` is a real numeric type that takes part in element conversion.
fn is_convertible(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Bool
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
    )
}

fn read_real(data_type: &DataType, bytes: &[u8]) -> Real {
    macro_rules! int {
        ($t:ty) => {
            Real::Int(i128::from(<$t>::from_ne_bytes(
                bytes.try_into().unwrap_or_default(),
            )))
        };
    }
    match data_type {
        DataType::Bool => Real::Int(i128::from(bytes[0] != 0)),
        DataType::Int8 => int!(i8),
        DataType::Int16 => int!(i16),
        DataType::Int32 => int!(i32),
        DataType::Int64 => int!(i64),
        DataType::UInt8 => int!(u8),
        DataType::UInt16 => int!(u16),
        DataType::UInt32 => int!(u32),
        DataType::UInt64 => int!(u64),
        DataType::Float16 => Real::Float(f16::from_ne_bytes(bytes.try_into().unwrap_or_default()).to_f64()),
        DataType::Float32 => Real::Float(f64::from(f32::from_ne_bytes(
            bytes.try_into().unwrap_or_default(),
        ))),
        _ => Real::Float(f64::from_ne_bytes(bytes.try_into().unwrap_or_default())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn write_real(data_type: &DataType, value: Real, out: &mut Vec<u8>) {
    macro_rules! int {
        ($t:ty) => {
            out.extend_from_slice(
                &(value.to_i128().clamp(i128::from(<$t>::MIN), i128::from(<$t>::MAX)) as $t)
                    .to_ne_bytes(),
            )
        };
    }
    match data_type {
        DataType::Bool => out.push(u8::from(match value {
            Real::Int(value) => value != 0,
            Real::Float(value) => value != 0.0 && !value.is_nan(),
        })),
        DataType::Int8 => int!(i8),
        DataType::Int16 => int!(i16),
        DataType::Int32 => int!(i32),
        DataType::Int64 => int!(i64),
        DataType::UInt8 => int!(u8),
        DataType::UInt16 => int!(u16),
        DataType::UInt32 => int!(u32),
        DataType::UInt64 => int!(u64),
        DataType::Float16 => out.extend_from_slice(&f16::from_f64(value.to_f64()).to_ne_bytes()),
        DataType::Float32 => out.extend_from_slice(&(value.to_f64() as f32).to_ne_bytes()),
        _ => out.extend_from_slice(&value.to_f64().to_ne_bytes()),
    }
}

/// Convert native endian `bytes` of elements with data type `from` to elements with data type `to`.
///
/// # Errors
/// Returns [`ArrayError::IncompatibleElementType`] if the data types differ and either is not a real numeric type, or [`ArrayError::InvalidBytesInputSize`] if `bytes` is not a whole number of elements.
pub fn convert_elements(
    bytes: &[u8],
    from: &DataType,
    to: &DataType,
) -> Result<Vec<u8>, ArrayError> {
    if from == to {
        return Ok(bytes.to_vec());
    }
    if !is_convertible(from) || !is_convertible(to) {
        return Err(ArrayError::IncompatibleElementType(from.clone(), to.clone()));
    }
    let size = from.size();
    if bytes.len() % size != 0 {
        return Err(ArrayError::InvalidBytesInputSize(
            bytes.len(),
            (bytes.len() / size * size) as u64,
        ));
    }
    let mut out = Vec::with_capacity(bytes.len() / size * to.size());
    for element in bytes.chunks_exact(size) {
        write_real(to, read_real(from, element), &mut out);
    }
    Ok(out)
}

/// Convert `elements` to native endian bytes of an array with `data_type`.
///
/// # Errors
/// Returns an [`ArrayError`] if the elements cannot be converted to `data_type`.
pub fn elements_to_array_bytes<T: Element>(
    elements: &[T],
    data_type: &DataType,
) -> Result<Vec<u8>, ArrayError> {
    let bytes = T::into_element_bytes(elements);
    if T::matches_data_type(data_type) {
        Ok(bytes)
    } else {
        convert_elements(&bytes, &T::data_type(), data_type)
    }
}

/// Convert native endian bytes of an array with `data_type` to elements.
///
/// # Errors
/// Returns an [`ArrayError`] if the elements cannot be converted from `data_type`.
pub fn array_bytes_to_elements<T: Element>(
    bytes: &[u8],
    data_type: &DataType,
) -> Result<Vec<T>, ArrayError> {
    if T::matches_data_type(data_type) {
        T::from_element_bytes(bytes)
    } else {
        T::from_element_bytes(&convert_elements(bytes, data_type, &T::data_type())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_bool() {
        assert_eq!(bool::into_element_bytes(&[true, false]), vec![1, 0]);
        assert_eq!(bool::from_element_bytes(&[0, 1]).unwrap(), vec![false, true]);
        assert!(matches!(
            bool::from_element_bytes(&[2]),
            Err(ArrayError::InvalidElementValue)
        ));
    }

    #[test]
    fn element_matches_time_types() {
        use crate::array::data_type::NumpyTimeUnit;
        let data_type = DataType::NumpyDateTime64 {
            unit: NumpyTimeUnit::Second,
            scale_factor: 1,
        };
        assert!(i64::matches_data_type(&data_type));
        assert!(!u64::matches_data_type(&data_type));
    }

    #[test]
    fn convert_float_to_int() {
        let bytes = f32::into_element_bytes(&[1.4, 1.6, -3.5, 300.0, f32::NAN, -1.0]);
        let converted = convert_elements(&bytes, &DataType::Float32, &DataType::UInt8).unwrap();
        assert_eq!(converted, vec![1, 2, 0, 255, 0, 0]);
        let converted = convert_elements(&bytes, &DataType::Float32, &DataType::Int16).unwrap();
        assert_eq!(
            i16::from_element_bytes(&converted).unwrap(),
            vec![1, 2, -4, 300, 0, -1]
        );
    }

    #[test]
    fn convert_int_to_float() {
        let elements: Vec<f64> =
            array_bytes_to_elements(&u16::into_element_bytes(&[0, 7, u16::MAX]), &DataType::UInt16)
                .unwrap();
        assert_eq!(elements, vec![0.0, 7.0, 65535.0]);
        let bytes = elements_to_array_bytes(&[-1i64, 1 << 40], &DataType::Int32).unwrap();
        assert_eq!(i32::from_element_bytes(&bytes).unwrap(), vec![-1, i32::MAX]);
    }

    #[test]
    fn convert_incompatible() {
        let bytes = Complex::<f32>::into_element_bytes(&[Complex::new(1.0, 2.0)]);
        assert!(matches!(
            convert_elements(&bytes, &DataType::Complex64, &DataType::Float64),
            Err(ArrayError::IncompatibleElementType(_, _))
        ));
        let bytes = convert_elements(&[1, 0], &DataType::Bool, &DataType::Float32).unwrap();
        assert_eq!(f32::from_element_bytes(&bytes).unwrap(), vec![1.0, 0.0]);
    }
}

//! Data types.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#data-types>.
//!
//! A [`DataType`] describes the in-memory and on-disk layout of one element: its size, the size of the components that are byte swapped by the `bytes` codec, and its [`DataTypeKind`].
//! It also converts [`FillValueMetadata`] into the native byte representation of a [`FillValue`].

use half::f16;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::Metadata;

use super::{
    fill_value_metadata::{bytes_to_hex_string, FillValueLiteral},
    FillValue, FillValueMetadata,
};

/// The maximum size in bytes of a fixed length string data type.
const MAX_STRING_SIZE: usize = 10 * 1024 * 1024;

/// A data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[rustfmt::skip]
pub enum DataType {
    /// `bool` Boolean.
    Bool,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    UInt64,
    /// `float16` IEEE 754 half-precision floating point.
    Float16,
    /// `float32` IEEE 754 single-precision floating point.
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    Float64,
    /// `complex64` real and imaginary components are each IEEE 754 single-precision floating point.
    Complex64,
    /// `complex128` real and imaginary components are each IEEE 754 double-precision floating point.
    Complex128,
    /// `null_terminated_bytes` fixed length byte string, the stored usize is the length in bytes.
    NullTerminatedBytes(usize),
    /// `fixed_length_utf32` fixed length unicode string, the stored usize is the length in bytes (a multiple of 4).
    FixedLengthUtf32(usize),
    /// `numpy.datetime64` a 64-bit time point.
    NumpyDateTime64 {
        /// The time unit.
        unit: NumpyTimeUnit,
        /// The number of units per increment.
        scale_factor: u32,
    },
    /// `numpy.timedelta64` a 64-bit time delta.
    NumpyTimeDelta64 {
        /// The time unit.
        unit: NumpyTimeUnit,
        /// The number of units per increment.
        scale_factor: u32,
    },
}

/// The kind of a [`DataType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataTypeKind {
    /// A boolean.
    Bool,
    /// A signed integer.
    SignedInteger,
    /// An unsigned integer.
    UnsignedInteger,
    /// A floating point number.
    Float,
    /// A complex number.
    Complex,
    /// A fixed length byte string.
    Bytes,
    /// A fixed length unicode string.
    Unicode,
    /// A time point.
    DateTime,
    /// A time delta.
    TimeDelta,
}

/// A numpy time unit.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum NumpyTimeUnit {
    #[serde(rename = "generic")]
    Generic,
    #[serde(rename = "Y")]
    Year,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "m")]
    Minute,
    #[serde(rename = "s")]
    Second,
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "us")]
    Microsecond,
    #[serde(rename = "ns")]
    Nanosecond,
    #[serde(rename = "ps")]
    Picosecond,
    #[serde(rename = "fs")]
    Femtosecond,
    #[serde(rename = "as")]
    Attosecond,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StringDataTypeConfiguration {
    length_bytes: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumpyTimeConfiguration {
    unit: NumpyTimeUnit,
    scale_factor: u32,
}

/// An unsupported data type error.
#[derive(Debug, Error)]
#[error("unsupported data type {_0}")]
pub struct UnsupportedDataTypeError(String);

/// A fill value metadata incompatibility error.
#[derive(Debug, Error)]
#[error("incompatible fill value {1} for data type {0}")]
pub struct IncompatibleFillValueMetadataError(String, FillValueMetadata);

impl IncompatibleFillValueMetadataError {
    /// Create a new incompatible fill value metadata error.
    #[must_use]
    pub fn new(data_type: String, fill_value_metadata: FillValueMetadata) -> Self {
        Self(data_type, fill_value_metadata)
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl DataType {
    /// Returns the name of the data type.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::NullTerminatedBytes(_) => "null_terminated_bytes",
            Self::FixedLengthUtf32(_) => "fixed_length_utf32",
            Self::NumpyDateTime64 { .. } => "numpy.datetime64",
            Self::NumpyTimeDelta64 { .. } => "numpy.timedelta64",
        }
        .to_string()
    }

    /// Returns the metadata of the data type.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        let configuration = match self {
            Self::NullTerminatedBytes(length_bytes) | Self::FixedLengthUtf32(length_bytes) => {
                serde_json::to_value(StringDataTypeConfiguration {
                    length_bytes: *length_bytes,
                })
            }
            Self::NumpyDateTime64 { unit, scale_factor }
            | Self::NumpyTimeDelta64 { unit, scale_factor } => {
                serde_json::to_value(NumpyTimeConfiguration {
                    unit: *unit,
                    scale_factor: *scale_factor,
                })
            }
            _ => return Metadata::new(&self.name()),
        };
        match configuration {
            Ok(serde_json::Value::Object(configuration)) => {
                Metadata::new_with_configuration(&self.name(), configuration)
            }
            _ => Metadata::new(&self.name()),
        }
    }

    /// Create a data type from metadata.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedDataTypeError`] if the metadata is not a known data type or its configuration is invalid.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, UnsupportedDataTypeError> {
        let unsupported = || UnsupportedDataTypeError(metadata.to_string());
        let name = metadata.name();
        let simple = match name {
            "bool" => Some(Self::Bool),
            "int8" => Some(Self::Int8),
            "int16" => Some(Self::Int16),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "uint8" => Some(Self::UInt8),
            "uint16" => Some(Self::UInt16),
            "uint32" => Some(Self::UInt32),
            "uint64" => Some(Self::UInt64),
            "float16" => Some(Self::Float16),
            "float32" => Some(Self::Float32),
            "float64" => Some(Self::Float64),
            "complex64" => Some(Self::Complex64),
            "complex128" => Some(Self::Complex128),
            _ => None,
        };
        if let Some(data_type) = simple {
            return if metadata.configuration().map_or(true, serde_json::Map::is_empty) {
                Ok(data_type)
            } else {
                Err(unsupported())
            };
        }

        match name {
            "null_terminated_bytes" | "fixed_length_utf32" => {
                let configuration: StringDataTypeConfiguration =
                    metadata.to_configuration().map_err(|_| unsupported())?;
                let length_bytes = configuration.length_bytes;
                if length_bytes == 0 || length_bytes > MAX_STRING_SIZE {
                    return Err(unsupported());
                }
                if name == "null_terminated_bytes" {
                    Ok(Self::NullTerminatedBytes(length_bytes))
                } else if length_bytes % 4 == 0 {
                    Ok(Self::FixedLengthUtf32(length_bytes))
                } else {
                    Err(unsupported())
                }
            }
            "numpy.datetime64" | "numpy.timedelta64" => {
                let NumpyTimeConfiguration { unit, scale_factor } =
                    metadata.to_configuration().map_err(|_| unsupported())?;
                if scale_factor == 0 {
                    return Err(unsupported());
                }
                if name == "numpy.datetime64" {
                    Ok(Self::NumpyDateTime64 { unit, scale_factor })
                } else {
                    Ok(Self::NumpyTimeDelta64 { unit, scale_factor })
                }
            }
            _ => Err(unsupported()),
        }
    }

    /// Returns the size in bytes of one element.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64
            | Self::UInt64
            | Self::Float64
            | Self::Complex64
            | Self::NumpyDateTime64 { .. }
            | Self::NumpyTimeDelta64 { .. } => 8,
            Self::Complex128 => 16,
            Self::NullTerminatedBytes(size) | Self::FixedLengthUtf32(size) => *size,
        }
    }

    /// Returns the size in bytes of the components of an element that are byte swapped when the on-disk byte order differs from the native byte order.
    #[must_use]
    pub const fn component_size(&self) -> usize {
        match self {
            Self::Complex64 => 4,
            Self::Complex128 => 8,
            Self::NullTerminatedBytes(_) => 1,
            Self::FixedLengthUtf32(_) => 4,
            _ => self.size(),
        }
    }

    /// Returns true if the on-disk representation depends on the byte order.
    #[must_use]
    pub const fn is_byte_order_dependent(&self) -> bool {
        self.component_size() > 1
    }

    /// Returns the kind of the data type.
    #[must_use]
    pub const fn kind(&self) -> DataTypeKind {
        match self {
            Self::Bool => DataTypeKind::Bool,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => DataTypeKind::SignedInteger,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => {
                DataTypeKind::UnsignedInteger
            }
            Self::Float16 | Self::Float32 | Self::Float64 => DataTypeKind::Float,
            Self::Complex64 | Self::Complex128 => DataTypeKind::Complex,
            Self::NullTerminatedBytes(_) => DataTypeKind::Bytes,
            Self::FixedLengthUtf32(_) => DataTypeKind::Unicode,
            Self::NumpyDateTime64 { .. } => DataTypeKind::DateTime,
            Self::NumpyTimeDelta64 { .. } => DataTypeKind::TimeDelta,
        }
    }

    /// Create a fill value from metadata.
    ///
    /// Returns [`None`] if the metadata is `null` (no fill value).
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleFillValueMetadataError`] if the fill value is incompatible with the data type.
    pub fn fill_value_from_metadata(
        &self,
        fill_value: &FillValueMetadata,
    ) -> Result<Option<FillValue>, IncompatibleFillValueMetadataError> {
        if fill_value == &FillValueMetadata::Null {
            if matches!(self.kind(), DataTypeKind::Float | DataTypeKind::Complex) {
                log::warn!("fill value null for floating point data type {self}, assuming no fill value");
            }
            return Ok(None);
        }
        let err = || IncompatibleFillValueMetadataError(self.name(), fill_value.clone());

        match self {
            Self::Complex64 | Self::Complex128 => {
                let FillValueMetadata::Array(components) = fill_value else {
                    return Err(err());
                };
                let component = if matches!(self, Self::Complex64) {
                    Self::Float32
                } else {
                    Self::Float64
                };
                let [re, im] = components.as_slice() else {
                    return Err(err());
                };
                let mut bytes = component.scalar_from_metadata(re).ok_or_else(err)?;
                bytes.extend(component.scalar_from_metadata(im).ok_or_else(err)?);
                Ok(Some(FillValue::new(bytes)))
            }
            Self::NullTerminatedBytes(size) => {
                let mut bytes = match fill_value {
                    FillValueMetadata::String(string) => string.as_bytes().to_vec(),
                    FillValueMetadata::Array(elements) => elements
                        .iter()
                        .map(|element| match element {
                            FillValueMetadata::UInt(byte) => u8::try_from(*byte).ok(),
                            _ => None,
                        })
                        .collect::<Option<Vec<u8>>>()
                        .ok_or_else(err)?,
                    _ => return Err(err()),
                };
                if bytes.len() > *size {
                    return Err(err());
                }
                bytes.resize(*size, 0);
                Ok(Some(FillValue::new(bytes)))
            }
            Self::FixedLengthUtf32(size) => {
                let FillValueMetadata::String(string) = fill_value else {
                    return Err(err());
                };
                let mut bytes: Vec<u8> = string
                    .chars()
                    .flat_map(|c| u32::from(c).to_ne_bytes())
                    .collect();
                if bytes.len() > *size {
                    return Err(err());
                }
                bytes.resize(*size, 0);
                Ok(Some(FillValue::new(bytes)))
            }
            _ => self
                .scalar_from_metadata(fill_value)
                .map(|bytes| Some(FillValue::new(bytes)))
                .ok_or_else(err),
        }
    }

    /// Native bytes of a scalar (non-complex, non-string) element from metadata.
    #[allow(clippy::cast_possible_truncation)]
    fn scalar_from_metadata(&self, fill_value: &FillValueMetadata) -> Option<Vec<u8>> {
        use FillValueMetadata as F;

        if let F::String(string) = fill_value {
            return match FillValueLiteral::parse(string, self.size())? {
                FillValueLiteral::Bits(mut bits) => {
                    if cfg!(target_endian = "little") {
                        bits.reverse();
                    }
                    Some(bits)
                }
                FillValueLiteral::NaN => match self {
                    Self::Float16 => Some(f16::NAN.to_ne_bytes().to_vec()),
                    Self::Float32 => Some(f32::NAN.to_ne_bytes().to_vec()),
                    Self::Float64 => Some(f64::NAN.to_ne_bytes().to_vec()),
                    _ => None,
                },
                FillValueLiteral::PosInfinity => self.float_to_ne_bytes(f64::INFINITY),
                FillValueLiteral::NegInfinity => self.float_to_ne_bytes(f64::NEG_INFINITY),
                FillValueLiteral::NaT => match self {
                    Self::NumpyDateTime64 { .. } | Self::NumpyTimeDelta64 { .. } => {
                        Some(i64::MIN.to_ne_bytes().to_vec())
                    }
                    _ => None,
                },
            };
        }

        match self {
            Self::Bool => match fill_value {
                F::Bool(value) => Some(vec![u8::from(*value)]),
                _ => None,
            },
            Self::Int8 => Some(i8::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::Int16 => Some(i16::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::Int32 => Some(i32::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::Int64 | Self::NumpyDateTime64 { .. } | Self::NumpyTimeDelta64 { .. } => {
                Some(i64::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec())
            }
            Self::UInt8 => Some(u8::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::UInt16 => Some(u16::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::UInt32 => Some(u32::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::UInt64 => Some(u64::try_from(as_i128(fill_value)?).ok()?.to_ne_bytes().to_vec()),
            Self::Float16 | Self::Float32 | Self::Float64 => {
                let value = match fill_value {
                    F::Float(value) => *value,
                    #[allow(clippy::cast_precision_loss)]
                    F::Int(value) => *value as f64,
                    #[allow(clippy::cast_precision_loss)]
                    F::UInt(value) => *value as f64,
                    _ => return None,
                };
                self.float_to_ne_bytes(value)
            }
            _ => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn float_to_ne_bytes(&self, value: f64) -> Option<Vec<u8>> {
        match self {
            Self::Float16 => Some(f16::from_f64(value).to_ne_bytes().to_vec()),
            Self::Float32 => Some((value as f32).to_ne_bytes().to_vec()),
            Self::Float64 => Some(value.to_ne_bytes().to_vec()),
            _ => None,
        }
    }

    /// Create fill value metadata from a fill value.
    ///
    /// # Errors
    ///
    /// Returns an [`IncompatibleFillValueMetadataError`] if the fill value size does not match the data type size.
    pub fn metadata_fill_value(
        &self,
        fill_value: Option<&FillValue>,
    ) -> Result<FillValueMetadata, IncompatibleFillValueMetadataError> {
        use FillValueMetadata as F;

        let Some(fill_value) = fill_value else {
            return Ok(F::Null);
        };
        let bytes = fill_value.as_ne_bytes();
        let err = || {
            IncompatibleFillValueMetadataError(self.name(), F::String(bytes_to_hex_string(bytes)))
        };
        if bytes.len() != self.size() {
            return Err(err());
        }

        macro_rules! ne {
            ( $t:ty ) => {
                <$t>::from_ne_bytes(bytes.try_into().map_err(|_| err())?)
            };
        }

        Ok(match self {
            Self::Bool => F::Bool(bytes[0] != 0),
            Self::Int8 => F::Int(ne!(i8).into()),
            Self::Int16 => F::Int(ne!(i16).into()),
            Self::Int32 => F::Int(ne!(i32).into()),
            Self::Int64 => F::Int(ne!(i64)),
            Self::UInt8 => F::UInt(ne!(u8).into()),
            Self::UInt16 => F::UInt(ne!(u16).into()),
            Self::UInt32 => F::UInt(ne!(u32).into()),
            Self::UInt64 => F::UInt(ne!(u64)),
            Self::Float16 => {
                let value = ne!(f16);
                float_metadata(value.to_f64(), value.to_bits() == f16::NAN.to_bits(), bytes)
            }
            Self::Float32 => {
                let value = ne!(f32);
                float_metadata(value.into(), value.to_bits() == f32::NAN.to_bits(), bytes)
            }
            Self::Float64 => {
                let value = ne!(f64);
                float_metadata(value, value.to_bits() == f64::NAN.to_bits(), bytes)
            }
            Self::Complex64 | Self::Complex128 => {
                let component = if matches!(self, Self::Complex64) {
                    Self::Float32
                } else {
                    Self::Float64
                };
                let (re, im) = bytes.split_at(component.size());
                F::Array(vec![
                    component.metadata_fill_value(Some(&FillValue::from(re)))?,
                    component.metadata_fill_value(Some(&FillValue::from(im)))?,
                ])
            }
            Self::NullTerminatedBytes(_) => {
                let end = bytes.iter().rposition(|&byte| byte != 0).map_or(0, |i| i + 1);
                match std::str::from_utf8(&bytes[..end]) {
                    Ok(string) if !string.contains('\0') => F::String(string.to_string()),
                    _ => F::Array(bytes.iter().map(|&byte| F::UInt(byte.into())).collect()),
                }
            }
            Self::FixedLengthUtf32(_) => {
                let string: Option<String> = bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .take_while(|&c| c != 0)
                    .map(char::from_u32)
                    .collect();
                F::String(string.ok_or_else(err)?)
            }
            Self::NumpyDateTime64 { .. } | Self::NumpyTimeDelta64 { .. } => {
                let value = ne!(i64);
                if value == i64::MIN {
                    F::String("NaT".to_string())
                } else {
                    F::Int(value)
                }
            }
        })
    }
}

fn as_i128(fill_value: &FillValueMetadata) -> Option<i128> {
    match fill_value {
        FillValueMetadata::Int(value) => Some((*value).into()),
        FillValueMetadata::UInt(value) => Some((*value).into()),
        #[allow(clippy::cast_possible_truncation)]
        FillValueMetadata::Float(value)
            if value.fract() == 0.0 && value.abs() < 2f64.powi(64) =>
        {
            Some(*value as i128)
        }
        _ => None,
    }
}

/// Float fill value metadata, with non-canonical NaNs written as their bit pattern.
fn float_metadata(value: f64, canonical_nan: bool, ne_bytes: &[u8]) -> FillValueMetadata {
    if value.is_nan() {
        if canonical_nan {
            FillValueMetadata::String("NaN".to_string())
        } else {
            let mut bits = ne_bytes.to_vec();
            if cfg!(target_endian = "little") {
                bits.reverse();
            }
            FillValueMetadata::String(bytes_to_hex_string(&bits))
        }
    } else if value == f64::INFINITY {
        FillValueMetadata::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        FillValueMetadata::String("-Infinity".to_string())
    } else {
        FillValueMetadata::Float(value)
    }
}

//! Fill value metadata.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#fill-value>.
//!
//! Fill value metadata is serialised/deserialised into [`FillValueMetadata`].
//! Its interpretation is data type dependent, so this is handled in [`DataType::fill_value_from_metadata`](crate::array::DataType::fill_value_from_metadata).

use serde::{Deserialize, Serialize};

/// Fill value metadata.
///
/// JSON `null` means that the array has no fill value.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum FillValueMetadata {
    /// No fill value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// An unsigned integer.
    UInt(u64),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string: `"NaN"`, `"Infinity"`, `"-Infinity"`, `"NaT"`, a `0x` hex or `0b` binary bit pattern, or the value of a string data type.
    String(String),
    /// An array: the components of a complex number or the bytes of a raw data type.
    Array(Vec<FillValueMetadata>),
}

impl core::fmt::Display for FillValueMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
    }
}

impl From<&str> for FillValueMetadata {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A recognised fill value string literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FillValueLiteral {
    NaN,
    PosInfinity,
    NegInfinity,
    NaT,
    /// A `0x`/`0b` bit pattern, most significant byte first.
    Bits(Vec<u8>),
}

impl FillValueLiteral {
    /// Parse a string literal for an element of `size` bytes.
    ///
    /// Bit patterns must have exactly as many digits as `size` bytes require.
    pub(crate) fn parse(string: &str, size: usize) -> Option<Self> {
        match string {
            "NaN" => Some(Self::NaN),
            "Infinity" | "+Infinity" => Some(Self::PosInfinity),
            "-Infinity" => Some(Self::NegInfinity),
            "NaT" => Some(Self::NaT),
            _ => {
                if let Some(digits) = string.strip_prefix("0x") {
                    (digits.len() == size * 2)
                        .then(|| parse_digits(digits, 16, 2))
                        .flatten()
                        .map(Self::Bits)
                } else if let Some(digits) = string.strip_prefix("0b") {
                    (digits.len() == size * 8)
                        .then(|| parse_digits(digits, 2, 8))
                        .flatten()
                        .map(Self::Bits)
                } else {
                    None
                }
            }
        }
    }
}

fn parse_digits(digits: &str, radix: u32, digits_per_byte: usize) -> Option<Vec<u8>> {
    if !digits.is_ascii() {
        return None;
    }
    (0..digits.len())
        .step_by(digits_per_byte)
        .map(|i| u8::from_str_radix(&digits[i..i + digits_per_byte], radix).ok())
        .collect()
}

/// Format `bytes` (most significant byte first) as a `0x` hex string.
pub(crate) fn bytes_to_hex_string(bytes: &[u8]) -> String {
    let mut string = String::with_capacity(2 + bytes.len() * 2);
    string.push_str("0x");
    for byte in bytes {
        string.push_str(&format!("{byte:02x}"));
    }
    string
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value_metadata_deserialize() {
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>("null").unwrap(),
            FillValueMetadata::Null
        );
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>("true").unwrap(),
            FillValueMetadata::Bool(true)
        );
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>("7").unwrap(),
            FillValueMetadata::UInt(7)
        );
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>("-7").unwrap(),
            FillValueMetadata::Int(-7)
        );
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>("7.5").unwrap(),
            FillValueMetadata::Float(7.5)
        );
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>(r#""NaN""#).unwrap(),
            FillValueMetadata::String("NaN".to_string())
        );
        assert_eq!(
            serde_json::from_str::<FillValueMetadata>("[1.0, 2]").unwrap(),
            FillValueMetadata::Array(vec![
                FillValueMetadata::Float(1.0),
                FillValueMetadata::UInt(2)
            ])
        );
        assert_eq!(FillValueMetadata::Null.to_string(), "null");
        assert_eq!(
            FillValueMetadata::from("Infinity"),
            FillValueMetadata::String("Infinity".to_string())
        );
    }

    #[test]
    fn fill_value_literal() {
        assert_eq!(
            FillValueLiteral::parse("0x7fc00000", 4),
            Some(FillValueLiteral::Bits(vec![0x7f, 0xc0, 0x00, 0x00]))
        );
        assert_eq!(FillValueLiteral::parse("0x7fc0000000", 4), None);
        assert_eq!(FillValueLiteral::parse("0xzz", 1), None);
        assert_eq!(
            FillValueLiteral::parse("0b0000000100000010", 2),
            Some(FillValueLiteral::Bits(vec![1, 2]))
        );
        assert_eq!(FillValueLiteral::parse("0b01", 1), None);
        assert_eq!(FillValueLiteral::parse("NaT", 8), Some(FillValueLiteral::NaT));
        assert_eq!(FillValueLiteral::parse("abc", 8), None);
        assert_eq!(bytes_to_hex_string(&[0x7f, 0xc0, 0, 0]), "0x7fc00000");
    }
}

//! The `bytes` array to bytes codec.
//!
//! Serialises the elements of a chunk in C order with a given byte order.
//! Multi-byte data types need an explicit `endian`; it may be omitted for single byte data types.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/codecs/bytes/v1.0.html>.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
    array::{
        codec::{
            ArrayCodecTraits, ArrayToBytesCodecTraits, Codec, CodecError, CodecPlugin,
            CodecTraits,
        },
        BytesRepresentation, ChunkRepresentation,
    },
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// The identifier for the `bytes` codec.
pub const IDENTIFIER: &str = "bytes";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_bytes, create_codec_bytes)
}

fn is_name_bytes(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_bytes(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: BytesCodecConfiguration = metadata.to_configuration()?;
    Ok(Codec::ArrayToBytes(Box::new(BytesCodec::new(
        configuration.endian,
    ))))
}

/// The byte order of multi-byte components, either `big` or `little`.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug, Display)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little endian.
    #[display("little")]
    Little,
    /// Big endian.
    #[display("big")]
    Big,
}

impl Endianness {
    /// Return true if the endianness matches the endianness of the CPU.
    #[must_use]
    pub fn is_native(self) -> bool {
        self == NATIVE_ENDIAN
    }
}

/// The endianness of the CPU.
pub const NATIVE_ENDIAN: Endianness = if cfg!(target_endian = "big") {
    Endianness::Big
} else {
    Endianness::Little
};

/// Configuration parameters for the `bytes` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct BytesCodecConfiguration {
    /// The byte order. Required for data types whose representation depends on the byte order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endian: Option<Endianness>,
}

/// A `bytes` codec implementation.
#[derive(Clone, Debug)]
pub struct BytesCodec {
    endian: Option<Endianness>,
}

impl Default for BytesCodec {
    fn default() -> Self {
        Self::new(Some(Endianness::Little))
    }
}

impl BytesCodec {
    /// Create a new `bytes` codec.
    #[must_use]
    pub const fn new(endian: Option<Endianness>) -> Self {
        Self { endian }
    }

    /// Create a new `bytes` codec for little endian data.
    #[must_use]
    pub const fn little() -> Self {
        Self::new(Some(Endianness::Little))
    }

    /// Create a new `bytes` codec for big endian data.
    #[must_use]
    pub const fn big() -> Self {
        Self::new(Some(Endianness::Big))
    }

    /// Convert between native and encoded byte order. The transform is its own inverse.
    fn swap_if_required(
        &self,
        mut value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let expected = decoded_representation.size_usize();
        if value.len() != expected {
            return Err(CodecError::UnexpectedDecodedSize {
                expected,
                got: value.len(),
            });
        }

        let data_type = decoded_representation.data_type();
        if !data_type.is_byte_order_dependent() {
            return Ok(value);
        }
        let Some(endian) = self.endian else {
            return Err(CodecError::Other(format!(
                "the bytes codec requires an endian for data type {data_type}"
            )));
        };
        if !endian.is_native() {
            let component_size = data_type.component_size();
            value
                .chunks_exact_mut(component_size)
                .for_each(<[u8]>::reverse);
        }
        Ok(value)
    }
}

impl CodecTraits for BytesCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        let configuration = BytesCodecConfiguration {
            endian: self.endian,
        };
        if configuration.endian.is_none() {
            Some(Metadata::new(IDENTIFIER))
        } else {
            Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).ok()
        }
    }
}

impl ArrayCodecTraits for BytesCodec {
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        self.swap_if_required(decoded_value, decoded_representation)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        self.swap_if_required(encoded_value, decoded_representation)
    }
}

impl ArrayToBytesCodecTraits for BytesCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError> {
        Ok(BytesRepresentation::FixedSize(decoded_representation.size()))
    }
}

#[cfg(test)]
mod tests {
    use crate::array::{DataType, FillValue};

    use super::*;

    #[test]
    fn codec_bytes_configuration() {
        let codec_configuration: BytesCodecConfiguration =
            serde_json::from_str(r#"{"endian":"big"}"#).unwrap();
        let codec = BytesCodec::new(codec_configuration.endian);
        assert_eq!(
            serde_json::to_string(&codec.create_metadata().unwrap()).unwrap(),
            r#"{"name":"bytes","configuration":{"endian":"big"}}"#
        );

        let codec_configuration: BytesCodecConfiguration = serde_json::from_str("{}").unwrap();
        let codec = BytesCodec::new(codec_configuration.endian);
        assert_eq!(
            serde_json::to_string(&codec.create_metadata().unwrap()).unwrap(),
            r#""bytes""#
        );

        assert!(serde_json::from_str::<BytesCodecConfiguration>(r#"{"endian":"middle"}"#).is_err());
    }

    #[test]
    fn codec_bytes_big_endian_u16() {
        let representation = ChunkRepresentation::new(
            vec![3].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        )
        .unwrap();
        let elements: Vec<u16> = vec![1, 2, 0x0304];
        let bytes: Vec<u8> = elements.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let codec = BytesCodec::big();
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        assert_eq!(encoded, vec![0, 1, 0, 2, 3, 4]);
        assert_eq!(codec.decode(encoded, &representation).unwrap(), bytes);
    }

    #[test]
    fn codec_bytes_complex_swaps_components() {
        let representation = ChunkRepresentation::new(
            vec![1].try_into().unwrap(),
            DataType::Complex64,
            FillValue::zero(8),
        )
        .unwrap();
        let mut bytes = 1.0f32.to_ne_bytes().to_vec();
        bytes.extend(2.0f32.to_ne_bytes());
        let encoded = BytesCodec::little().encode(bytes, &representation).unwrap();
        let mut expected = 1.0f32.to_le_bytes().to_vec();
        expected.extend(2.0f32.to_le_bytes());
        assert_eq!(encoded, expected);
    }

    #[test]
    fn codec_bytes_requires_endian() {
        let representation = ChunkRepresentation::new(
            vec![2].try_into().unwrap(),
            DataType::Int32,
            FillValue::from(0i32),
        )
        .unwrap();
        assert!(BytesCodec::new(None).encode(vec![0; 8], &representation).is_err());

        let representation = ChunkRepresentation::new(
            vec![2].try_into().unwrap(),
            DataType::UInt8,
            FillValue::from(0u8),
        )
        .unwrap();
        assert!(BytesCodec::new(None).encode(vec![0; 2], &representation).is_ok());
        assert!(BytesCodec::little().decode(vec![0; 3], &representation).is_err());
    }
}

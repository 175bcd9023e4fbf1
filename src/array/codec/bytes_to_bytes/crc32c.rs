//! The `crc32c` bytes to bytes codec.
//!
//! Appends a CRC32C checksum of the input bytestream.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/codecs/crc32c/v1.0.html>.

use crate::{
    array::{
        codec::{BytesToBytesCodecTraits, Codec, CodecError, CodecPlugin, CodecTraits},
        BytesRepresentation,
    },
    config::global_config,
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// The identifier for the `crc32c` codec.
pub const IDENTIFIER: &str = "crc32c";

const CHECKSUM_SIZE: usize = core::mem::size_of::<u32>();

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_crc32c, create_codec_crc32c)
}

fn is_name_crc32c(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_crc32c(_metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    Ok(Codec::BytesToBytes(Box::new(Crc32cCodec::new())))
}

/// A `crc32c` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct Crc32cCodec;

impl Crc32cCodec {
    /// Create a new `crc32c` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CodecTraits for Crc32cCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        Some(Metadata::new(IDENTIFIER))
    }
}

impl BytesToBytesCodecTraits for Crc32cCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        match decoded_representation {
            BytesRepresentation::FixedSize(size) => {
                BytesRepresentation::FixedSize(size + CHECKSUM_SIZE as u64)
            }
            BytesRepresentation::BoundedSize(size) => {
                BytesRepresentation::BoundedSize(size + CHECKSUM_SIZE as u64)
            }
            BytesRepresentation::UnboundedSize => BytesRepresentation::UnboundedSize,
        }
    }

    fn encode(&self, mut decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let checksum = crc32c::crc32c(&decoded_value).to_le_bytes();
        decoded_value.extend_from_slice(&checksum);
        Ok(decoded_value)
    }

    fn decode(
        &self,
        mut encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        if encoded_value.len() < CHECKSUM_SIZE {
            return Err(CodecError::Other(
                "crc32c decoder expects a 32 bit input".to_string(),
            ));
        }
        let decoded_len = encoded_value.len() - CHECKSUM_SIZE;
        if global_config().validate_checksums() {
            let checksum = crc32c::crc32c(&encoded_value[..decoded_len]).to_le_bytes();
            if checksum != encoded_value[decoded_len..] {
                return Err(CodecError::InvalidChecksum);
            }
        }
        encoded_value.truncate(decoded_len);
        Ok(encoded_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_crc32c_appends_checksum() {
        let codec = Crc32cCodec::new();
        let encoded = codec.encode(b"123456789".to_vec()).unwrap();
        // CRC-32C check value
        assert_eq!(&encoded[9..], &0xE306_9283u32.to_le_bytes());
        let decoded = codec
            .decode(encoded, &BytesRepresentation::FixedSize(9))
            .unwrap();
        assert_eq!(decoded, b"123456789");
    }

    #[test]
    fn codec_crc32c_invalid_checksum() {
        let codec = Crc32cCodec::new();
        let mut encoded = codec.encode(vec![1, 2, 3]).unwrap();
        encoded[0] = 0;
        assert!(matches!(
            codec.decode(encoded, &BytesRepresentation::FixedSize(3)),
            Err(CodecError::InvalidChecksum)
        ));
        assert!(codec
            .decode(vec![1, 2], &BytesRepresentation::FixedSize(0))
            .is_err());
    }
}

//! The `gzip` bytes to bytes codec.
//!
//! Applies [gzip](https://datatracker.ietf.org/doc/html/rfc1952) compression.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/codecs/gzip/v1.0.html>.

use std::io::{Cursor, Read};

use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::{
        codec::{BytesToBytesCodecTraits, Codec, CodecError, CodecPlugin, CodecTraits},
        BytesRepresentation,
    },
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// The identifier for the `gzip` codec.
pub const IDENTIFIER: &str = "gzip";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_gzip, create_codec_gzip)
}

fn is_name_gzip(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_gzip(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: GzipCodecConfiguration = metadata.to_configuration()?;
    let codec = GzipCodec::new(configuration.level)
        .map_err(|err| PluginCreateError::Other(err.to_string()))?;
    Ok(Codec::BytesToBytes(Box::new(codec)))
}

/// Configuration parameters for the `gzip` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct GzipCodecConfiguration {
    /// The compression level, an integer from 0 to 9.
    pub level: u32,
}

/// An invalid gzip compression level.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid gzip compression level {0}, must be from 0 to 9")]
pub struct GzipCompressionLevelError(u32);

/// A `gzip` codec implementation.
#[derive(Clone, Debug)]
pub struct GzipCodec {
    compression_level: u32,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    ///
    /// # Errors
    ///
    /// Returns [`GzipCompressionLevelError`] if `compression_level` is not valid.
    pub fn new(compression_level: u32) -> Result<Self, GzipCompressionLevelError> {
        if compression_level <= 9 {
            Ok(Self { compression_level })
        } else {
            Err(GzipCompressionLevelError(compression_level))
        }
    }
}

impl CodecTraits for GzipCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        let configuration = GzipCodecConfiguration {
            level: self.compression_level,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).ok()
    }
}

impl BytesToBytesCodecTraits for GzipCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        // deflate stored blocks add 5 bytes per 16 KiB, plus the gzip header and trailer
        decoded_representation
            .size()
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                BytesRepresentation::BoundedSize(size + 5 * size.div_ceil(16383) + 18)
            })
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
        let capacity = decoded_representation.size().unwrap_or_default();
        let mut out: Vec<u8> = Vec::with_capacity(usize::try_from(capacity).unwrap_or_default());
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_gzip_configuration() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"gzip","configuration":{"level":5}}"#).unwrap();
        let Codec::BytesToBytes(codec) = Codec::from_metadata(&metadata).unwrap() else {
            panic!("gzip is a bytes to bytes codec");
        };
        assert_eq!(codec.create_metadata().unwrap(), metadata);

        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"gzip","configuration":{"level":10}}"#).unwrap();
        assert!(Codec::from_metadata(&metadata).is_err());
    }

    #[test]
    fn codec_gzip_compresses_repetitive_data() {
        let bytes: Vec<u8> = (0..4096u32).map(|i| (i % 4) as u8).collect();
        let codec = GzipCodec::new(5).unwrap();
        let encoded = codec.encode(bytes.clone()).unwrap();
        assert!(encoded.len() < bytes.len());
        let decoded = codec
            .decode(encoded, &BytesRepresentation::FixedSize(4096))
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn codec_gzip_encoded_size_bound() {
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i * 7919 % 251) as u8).collect();
        let codec = GzipCodec::new(0).unwrap();
        let encoded = codec.encode(bytes).unwrap();
        let bound = codec
            .compute_encoded_size(&BytesRepresentation::FixedSize(1000))
            .size()
            .unwrap();
        assert!(encoded.len() as u64 <= bound);
    }
}

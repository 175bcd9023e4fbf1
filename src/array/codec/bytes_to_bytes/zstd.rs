//! The `zstd` bytes to bytes codec.
//!
//! Applies [Zstandard](https://tools.ietf.org/html/rfc8878) compression.
//!
//! See <https://github.com/zarr-developers/zarr-specs/pull/256>.

use std::io::Write;

use serde::{Deserialize, Serialize};
use zstd::zstd_safe;

use crate::{
    array::{
        codec::{BytesToBytesCodecTraits, Codec, CodecError, CodecPlugin, CodecTraits},
        BytesRepresentation,
    },
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// The identifier for the `zstd` codec.
pub const IDENTIFIER: &str = "zstd";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_zstd, create_codec_zstd)
}

fn is_name_zstd(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_zstd(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: ZstdCodecConfiguration = metadata.to_configuration()?;
    Ok(Codec::BytesToBytes(Box::new(ZstdCodec::new(
        configuration.level.0,
        configuration.checksum,
    ))))
}

/// Configuration parameters for the `zstd` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ZstdCodecConfiguration {
    /// The compression level.
    pub level: ZstdCompressionLevel,
    /// Store a checksum of the decoded data in each frame.
    #[serde(default)]
    pub checksum: bool,
}

/// A zstd compression level, an integer from -131072 to 22.
///
/// 0 selects the default compression level.
#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug)]
pub struct ZstdCompressionLevel(zstd_safe::CompressionLevel);

impl<'de> serde::Deserialize<'de> for ZstdCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = i64::deserialize(d)?;
        i32::try_from(level)
            .ok()
            .filter(|level| (-131_072..=22).contains(level))
            .map(Self)
            .ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "zstd compression level {level} is not from -131072 to 22"
                ))
            })
    }
}

/// A `zstd` codec implementation.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    compression: zstd_safe::CompressionLevel,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    #[must_use]
    pub const fn new(compression: zstd_safe::CompressionLevel, checksum: bool) -> Self {
        Self {
            compression,
            checksum,
        }
    }
}

impl CodecTraits for ZstdCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        let configuration = ZstdCodecConfiguration {
            level: ZstdCompressionLevel(self.compression),
            checksum: self.checksum,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).ok()
    }
}

impl BytesToBytesCodecTraits for ZstdCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation
            .size()
            .and_then(|size| usize::try_from(size).ok())
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                // frame header and checksum on top of the block bound
                BytesRepresentation::BoundedSize(zstd_safe::compress_bound(size) as u64 + 22)
            })
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.compression)?;
        encoder.include_checksum(self.checksum)?;
        encoder.include_contentsize(true)?;
        encoder.set_pledged_src_size(Some(decoded_value.len() as u64))?;
        encoder.write_all(&decoded_value)?;
        Ok(encoder.finish()?)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(encoded_value.as_slice()).map_err(CodecError::IOError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_zstd_configuration() {
        let configuration: ZstdCodecConfiguration =
            serde_json::from_str(r#"{"level":22,"checksum":true}"#).unwrap();
        assert!(configuration.checksum);
        assert!(serde_json::from_str::<ZstdCodecConfiguration>(r#"{"level":23}"#).is_err());

        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"zstd","configuration":{"level":1,"checksum":false}}"#)
                .unwrap();
        let Codec::BytesToBytes(codec) = Codec::from_metadata(&metadata).unwrap() else {
            panic!("zstd is a bytes to bytes codec");
        };
        assert_eq!(codec.create_metadata().unwrap(), metadata);
    }

    #[test]
    fn codec_zstd_checksum_detects_corruption() {
        let bytes: Vec<u8> = (0..2048u32).map(|i| (i % 13) as u8).collect();
        let codec = ZstdCodec::new(3, true);
        let encoded = codec.encode(bytes.clone()).unwrap();
        let representation = BytesRepresentation::FixedSize(2048);
        assert_eq!(
            codec.decode(encoded.clone(), &representation).unwrap(),
            bytes
        );

        let mut corrupt = encoded;
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;
        assert!(codec.decode(corrupt, &representation).is_err());
    }
}

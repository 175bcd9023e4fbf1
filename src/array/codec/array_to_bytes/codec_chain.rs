//! An array to bytes codec formed by joining an array to array sequence, an array to bytes codec, and a bytes to bytes sequence of codecs.

use crate::{
    array::{
        codec::{
            extract_array_subsets, ArrayCodecTraits, ArrayToArrayCodecTraits,
            ArrayToBytesCodecTraits, BytesPartialDecoderTraits, BytesToBytesCodecTraits, Codec,
            CodecError, CodecTraits,
        },
        BytesRepresentation, ChunkRepresentation, ChunkShape,
    },
    array_subset::ArraySubset,
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// A codec chain is a sequence of array to array codecs, one array to bytes codec, and a sequence of bytes to bytes codecs.
///
/// Encoding applies the codecs in order, decoding in reverse order.
#[derive(Debug, Clone)]
pub struct CodecChain {
    array_to_array: Vec<Box<dyn ArrayToArrayCodecTraits>>,
    array_to_bytes: Box<dyn ArrayToBytesCodecTraits>,
    bytes_to_bytes: Vec<Box<dyn BytesToBytesCodecTraits>>,
}

impl CodecChain {
    /// Create a new codec chain.
    #[must_use]
    pub fn new(
        array_to_array: Vec<Box<dyn ArrayToArrayCodecTraits>>,
        array_to_bytes: Box<dyn ArrayToBytesCodecTraits>,
        bytes_to_bytes: Vec<Box<dyn BytesToBytesCodecTraits>>,
    ) -> Self {
        Self {
            array_to_array,
            array_to_bytes,
            bytes_to_bytes,
        }
    }

    /// Create a new codec chain from a list of metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginCreateError`] if:
    ///  - a codec could not be created,
    ///  - no array to bytes codec is supplied,
    ///  - more than one array to bytes codec is supplied, or
    ///  - the codecs are not ordered array to array, array to bytes, bytes to bytes.
    pub fn from_metadata(metadatas: &[Metadata]) -> Result<Self, PluginCreateError> {
        let mut array_to_array: Vec<Box<dyn ArrayToArrayCodecTraits>> = vec![];
        let mut array_to_bytes: Option<Box<dyn ArrayToBytesCodecTraits>> = None;
        let mut bytes_to_bytes: Vec<Box<dyn BytesToBytesCodecTraits>> = vec![];
        for metadata in metadatas {
            match Codec::from_metadata(metadata)? {
                Codec::ArrayToArray(codec) => {
                    if array_to_bytes.is_some() {
                        return Err(PluginCreateError::Other(format!(
                            "array to array codec {} follows the array to bytes codec",
                            metadata.name()
                        )));
                    }
                    array_to_array.push(codec);
                }
                Codec::ArrayToBytes(codec) => {
                    if array_to_bytes.is_some() {
                        return Err(PluginCreateError::Other(
                            "multiple array to bytes codecs".to_string(),
                        ));
                    }
                    array_to_bytes = Some(codec);
                }
                Codec::BytesToBytes(codec) => {
                    if array_to_bytes.is_none() {
                        return Err(PluginCreateError::Other(format!(
                            "bytes to bytes codec {} precedes the array to bytes codec",
                            metadata.name()
                        )));
                    }
                    bytes_to_bytes.push(codec);
                }
            }
        }

        array_to_bytes
            .map(|array_to_bytes| Self::new(array_to_array, array_to_bytes, bytes_to_bytes))
            .ok_or_else(|| PluginCreateError::Other("missing array to bytes codec".to_string()))
    }

    /// Create codec chain metadata.
    #[must_use]
    pub fn create_metadatas(&self) -> Vec<Metadata> {
        let mut metadatas =
            Vec::with_capacity(self.array_to_array.len() + 1 + self.bytes_to_bytes.len());
        for codec in &self.array_to_array {
            metadatas.extend(codec.create_metadata());
        }
        metadatas.extend(self.array_to_bytes.create_metadata());
        for codec in &self.bytes_to_bytes {
            metadatas.extend(codec.create_metadata());
        }
        metadatas
    }

    /// Get the array to array codecs.
    #[must_use]
    pub fn array_to_array_codecs(&self) -> &[Box<dyn ArrayToArrayCodecTraits>] {
        &self.array_to_array
    }

    /// Get the array to bytes codec.
    #[allow(clippy::borrowed_box)]
    #[must_use]
    pub fn array_to_bytes_codec(&self) -> &Box<dyn ArrayToBytesCodecTraits> {
        &self.array_to_bytes
    }

    /// Get the bytes to bytes codecs.
    #[must_use]
    pub fn bytes_to_bytes_codecs(&self) -> &[Box<dyn BytesToBytesCodecTraits>] {
        &self.bytes_to_bytes
    }

    /// The decoded representations of each array to array codec and the array to bytes codec, in encode order.
    fn get_array_representations(
        &self,
        decoded_representation: ChunkRepresentation,
    ) -> Result<Vec<ChunkRepresentation>, CodecError> {
        let mut array_representations = Vec::with_capacity(self.array_to_array.len() + 1);
        array_representations.push(decoded_representation);
        for codec in &self.array_to_array {
            let next = codec.compute_encoded_representation(
                array_representations
                    .last()
                    .ok_or_else(|| CodecError::from("missing array representation"))?,
            )?;
            array_representations.push(next);
        }
        Ok(array_representations)
    }

    /// The decoded representations of each bytes to bytes codec, in encode order.
    fn get_bytes_representations(
        &self,
        array_representation_last: &ChunkRepresentation,
    ) -> Result<Vec<BytesRepresentation>, CodecError> {
        let mut bytes_representations = Vec::with_capacity(self.bytes_to_bytes.len() + 1);
        let mut bytes_representation = self
            .array_to_bytes
            .compute_encoded_size(array_representation_last)?;
        bytes_representations.push(bytes_representation);
        for codec in &self.bytes_to_bytes {
            bytes_representation = codec.compute_encoded_size(&bytes_representation);
            bytes_representations.push(bytes_representation);
        }
        Ok(bytes_representations)
    }
}

impl CodecTraits for CodecChain {
    /// A codec chain is described by [`create_metadatas`](CodecChain::create_metadatas) instead.
    fn create_metadata(&self) -> Option<Metadata> {
        None
    }
}

impl ArrayCodecTraits for CodecChain {
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let expected = decoded_representation.size_usize();
        if decoded_value.len() != expected {
            return Err(CodecError::UnexpectedDecodedSize {
                expected,
                got: decoded_value.len(),
            });
        }

        let mut value = decoded_value;
        let mut representation = decoded_representation.clone();
        for codec in &self.array_to_array {
            value = codec.encode(value, &representation)?;
            representation = codec.compute_encoded_representation(&representation)?;
        }

        value = self.array_to_bytes.encode(value, &representation)?;

        for codec in &self.bytes_to_bytes {
            value = codec.encode(value)?;
        }
        Ok(value)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let array_representations =
            self.get_array_representations(decoded_representation.clone())?;
        let array_representation_last = array_representations
            .last()
            .ok_or_else(|| CodecError::from("missing array representation"))?;
        let bytes_representations = self.get_bytes_representations(array_representation_last)?;

        let mut value = encoded_value;
        for (codec, bytes_representation) in std::iter::zip(
            self.bytes_to_bytes.iter().rev(),
            bytes_representations.iter().rev().skip(1),
        ) {
            value = codec.decode(value, bytes_representation)?;
        }

        value = self
            .array_to_bytes
            .decode(value, array_representation_last)?;

        for (codec, array_representation) in std::iter::zip(
            self.array_to_array.iter().rev(),
            array_representations.iter().rev().skip(1),
        ) {
            value = codec.decode(value, array_representation)?;
        }

        let expected = decoded_representation.size_usize();
        if value.len() == expected {
            Ok(value)
        } else {
            Err(CodecError::UnexpectedDecodedSize {
                expected,
                got: value.len(),
            })
        }
    }
}

impl ArrayToBytesCodecTraits for CodecChain {
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError> {
        let array_representations =
            self.get_array_representations(decoded_representation.clone())?;
        let array_representation_last = array_representations
            .last()
            .ok_or_else(|| CodecError::from("missing array representation"))?;
        self.get_bytes_representations(array_representation_last)?
            .last()
            .copied()
            .ok_or_else(|| CodecError::from("missing bytes representation"))
    }

    /// The inner chunk shape of the array to bytes codec, if it is not preceded by an array to array codec.
    fn inner_chunk_shape(&self) -> Option<&ChunkShape> {
        if self.array_to_array.is_empty() {
            self.array_to_bytes.inner_chunk_shape()
        } else {
            None
        }
    }

    /// True if the chain is a lone partial decoding capable array to bytes codec.
    fn supports_partial_decoding(&self) -> bool {
        self.array_to_array.is_empty()
            && self.bytes_to_bytes.is_empty()
            && self.array_to_bytes.supports_partial_decoding()
    }

    fn partial_decode(
        &self,
        input: &dyn BytesPartialDecoderTraits,
        decoded_representation: &ChunkRepresentation,
        array_subsets: &[ArraySubset],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        if self.supports_partial_decoding() {
            return self
                .array_to_bytes
                .partial_decode(input, decoded_representation, array_subsets);
        }
        let Some(encoded_value) = input.decode()? else {
            return Ok(None);
        };
        let decoded_value = self.decode(encoded_value.to_vec(), decoded_representation)?;
        extract_array_subsets(&decoded_value, decoded_representation, array_subsets).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use crate::array::{DataType, FillValue};

    use super::*;

    const JSON_CODECS: &str = r#"[
    {"name": "transpose", "configuration": {"order": [1, 0]}},
    {"name": "bytes", "configuration": {"endian": "big"}},
    {"name": "gzip", "configuration": {"level": 1}},
    "crc32c"
]"#;

    fn representation() -> ChunkRepresentation {
        ChunkRepresentation::new(
            vec![3, 4].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        )
        .unwrap()
    }

    #[test]
    #[cfg(all(feature = "gzip", feature = "crc32c"))]
    fn codec_chain_round_trip() {
        let metadatas: Vec<Metadata> = serde_json::from_str(JSON_CODECS).unwrap();
        let codec = CodecChain::from_metadata(&metadatas).unwrap();
        assert_eq!(codec.create_metadatas(), metadatas);
        assert!(!codec.supports_partial_decoding());
        assert!(codec.inner_chunk_shape().is_none());

        let representation = representation();
        let bytes: Vec<u8> = (0..12u16).flat_map(u16::to_ne_bytes).collect();
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        let decoded = codec.decode(encoded.clone(), &representation).unwrap();
        assert_eq!(bytes, decoded);

        let mut corrupt = encoded;
        corrupt[0] ^= 1;
        assert!(codec.decode(corrupt, &representation).is_err());
    }

    #[test]
    fn codec_chain_invalid_order() {
        let metadatas: Vec<Metadata> =
            serde_json::from_str(r#"["bytes", {"name": "transpose", "configuration": {"order": [0]}}]"#)
                .unwrap();
        assert!(CodecChain::from_metadata(&metadatas).is_err());
        let metadatas: Vec<Metadata> = serde_json::from_str(r#"["bytes", "bytes"]"#).unwrap();
        assert!(CodecChain::from_metadata(&metadatas).is_err());
        assert!(CodecChain::from_metadata(&[]).is_err());
        let metadatas: Vec<Metadata> = serde_json::from_str(r#"["unknown"]"#).unwrap();
        assert!(CodecChain::from_metadata(&metadatas).is_err());
    }

    #[test]
    fn codec_chain_unexpected_decoded_size() {
        let metadatas: Vec<Metadata> =
            serde_json::from_str(r#"[{"name": "bytes", "configuration": {"endian": "little"}}]"#)
                .unwrap();
        let codec = CodecChain::from_metadata(&metadatas).unwrap();
        assert!(matches!(
            codec.decode(vec![0; 10], &representation()),
            Err(CodecError::UnexpectedDecodedSize {
                expected: 24,
                got: 10
            })
        ));
    }
}

//! The `transpose` array to array codec.
//!
//! Permutes the dimensions of chunks.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/codecs/transpose/v1.0.html>.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
    array::{
        codec::{
            ArrayCodecTraits, ArrayToArrayCodecTraits, Codec, CodecError, CodecPlugin,
            CodecTraits,
        },
        ChunkRepresentation, ChunkShape,
    },
    metadata::Metadata,
    plugin::PluginCreateError,
};

/// The identifier for the `transpose` codec.
pub const IDENTIFIER: &str = "transpose";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_transpose, create_codec_transpose)
}

fn is_name_transpose(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_transpose(metadata: &Metadata) -> Result<Codec, PluginCreateError> {
    let configuration: TransposeCodecConfiguration = metadata.to_configuration()?;
    Ok(Codec::ArrayToArray(Box::new(TransposeCodec::new(
        configuration.order,
    ))))
}

/// Configuration parameters for the `transpose` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[serde(deny_unknown_fields)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct TransposeCodecConfiguration {
    /// The permutation of the chunk dimensions applied on encode.
    pub order: TransposeOrder,
}

/// A permutation of `0, 1, …, n-1`, where `n` is the dimensionality of the chunk.
#[derive(Serialize, Clone, Eq, PartialEq, Debug)]
pub struct TransposeOrder(Vec<usize>);

impl TransposeOrder {
    /// Create a new [`TransposeOrder`].
    ///
    /// Returns [`None`] if `order` is not a permutation.
    #[must_use]
    pub fn new(order: &[usize]) -> Option<Self> {
        is_permutation(order).then(|| Self(order.to_vec()))
    }
}

impl<'de> serde::Deserialize<'de> for TransposeOrder {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let order = Vec::<usize>::deserialize(d)?;
        Self::new(&order).ok_or_else(|| {
            serde::de::Error::custom(format!("transpose order {order:?} is not a permutation"))
        })
    }
}

fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    for &axis in order {
        match seen.get_mut(axis) {
            Some(seen) if !*seen => *seen = true,
            _ => return false,
        }
    }
    !order.is_empty()
}

/// A `transpose` codec implementation.
#[derive(Clone, Debug)]
pub struct TransposeCodec {
    order: TransposeOrder,
}

impl TransposeCodec {
    /// Create a new `transpose` codec.
    #[must_use]
    pub const fn new(order: TransposeOrder) -> Self {
        Self { order }
    }

    fn check_dimensionality(&self, dimensionality: usize) -> Result<(), CodecError> {
        if self.order.0.len() == dimensionality {
            Ok(())
        } else {
            Err(CodecError::Other(format!(
                "transpose order {:?} does not match the chunk dimensionality {dimensionality}",
                self.order.0
            )))
        }
    }
}

impl CodecTraits for TransposeCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        let configuration = TransposeCodecConfiguration {
            order: self.order.clone(),
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).ok()
    }
}

impl ArrayCodecTraits for TransposeCodec {
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        self.check_dimensionality(decoded_representation.dimensionality())?;
        let shape = decoded_representation.shape_u64();
        transpose_array(
            &self.order.0,
            &shape,
            decoded_representation.element_size(),
            &decoded_value,
        )
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        self.check_dimensionality(decoded_representation.dimensionality())?;
        let transposed_shape = permute(&decoded_representation.shape_u64(), &self.order);
        let mut order_decode = vec![0; self.order.0.len()];
        for (i, &axis) in self.order.0.iter().enumerate() {
            order_decode[axis] = i;
        }
        transpose_array(
            &order_decode,
            &transposed_shape,
            decoded_representation.element_size(),
            &encoded_value,
        )
    }
}

impl ArrayToArrayCodecTraits for TransposeCodec {
    fn compute_encoded_representation(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<ChunkRepresentation, CodecError> {
        self.check_dimensionality(decoded_representation.dimensionality())?;
        let transposed_shape: ChunkShape =
            permute(decoded_representation.shape(), &self.order).into();
        ChunkRepresentation::new(
            transposed_shape,
            decoded_representation.data_type().clone(),
            decoded_representation.fill_value().clone(),
        )
        .map_err(|err| CodecError::Other(err.to_string()))
    }
}

fn permute<T: Copy>(v: &[T], order: &TransposeOrder) -> Vec<T> {
    order.0.iter().map(|&axis| v[axis]).collect()
}

/// Permute the axes of `data` with shape `shape`, keeping each element of `element_size` bytes contiguous.
fn transpose_array(
    order: &[usize],
    shape: &[u64],
    element_size: usize,
    data: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let mut shape_n = shape
        .iter()
        .map(|&size| usize::try_from(size).map_err(|_| CodecError::from("chunk is too large")))
        .collect::<Result<Vec<_>, _>>()?;
    shape_n.push(element_size);
    let expected = shape_n.iter().product::<usize>();
    let array = ndarray::ArrayViewD::<u8>::from_shape(shape_n, data).map_err(|_| {
        CodecError::UnexpectedDecodedSize {
            expected,
            got: data.len(),
        }
    })?;

    let mut order_n = Vec::with_capacity(order.len() + 1);
    order_n.extend_from_slice(order);
    order_n.push(order.len());
    Ok(array.permuted_axes(order_n).iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use crate::array::{DataType, FillValue};

    use super::*;

    #[test]
    fn transpose_order() {
        assert!(TransposeOrder::new(&[2, 0, 1]).is_some());
        assert!(TransposeOrder::new(&[0, 0, 1]).is_none());
        assert!(TransposeOrder::new(&[0, 2]).is_none());
        assert!(TransposeOrder::new(&[]).is_none());
        assert!(serde_json::from_str::<TransposeCodecConfiguration>(r#"{"order":[1,1]}"#).is_err());
    }

    #[test]
    fn codec_transpose_2d() {
        let representation = ChunkRepresentation::new(
            vec![2, 3].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        )
        .unwrap();
        let elements: Vec<u16> = vec![0, 1, 2, 3, 4, 5];
        let bytes: Vec<u8> = elements.iter().flat_map(|v| v.to_ne_bytes()).collect();

        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"transpose","configuration":{"order":[1,0]}}"#)
                .unwrap();
        let Codec::ArrayToArray(codec) = Codec::from_metadata(&metadata).unwrap() else {
            panic!("transpose is an array to array codec");
        };
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        let encoded_elements: Vec<u16> = encoded
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(encoded_elements, vec![0, 3, 1, 4, 2, 5]);
        assert_eq!(
            codec
                .compute_encoded_representation(&representation)
                .unwrap()
                .shape_u64(),
            vec![3, 2]
        );

        let decoded = codec.decode(encoded, &representation).unwrap();
        assert_eq!(decoded, bytes);
        assert_eq!(codec.create_metadata().unwrap(), metadata);
    }

    #[test]
    fn codec_transpose_3d_decode_inverts_encode() {
        let representation = ChunkRepresentation::new(
            vec![2, 3, 4].try_into().unwrap(),
            DataType::UInt8,
            FillValue::from(0u8),
        )
        .unwrap();
        let bytes: Vec<u8> = (0..24).collect();
        let codec = TransposeCodec::new(TransposeOrder::new(&[2, 0, 1]).unwrap());
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        assert_ne!(encoded, bytes);
        // element (i, j, k) is stored at (k, i, j)
        assert_eq!(encoded[1], 4);
        assert_eq!(codec.decode(encoded, &representation).unwrap(), bytes);
    }

    #[test]
    fn codec_transpose_wrong_dimensionality() {
        let representation = ChunkRepresentation::new(
            vec![2, 3].try_into().unwrap(),
            DataType::UInt8,
            FillValue::from(0u8),
        )
        .unwrap();
        let codec = TransposeCodec::new(TransposeOrder::new(&[2, 0, 1]).unwrap());
        assert!(codec.encode(vec![0; 6], &representation).is_err());
    }
}

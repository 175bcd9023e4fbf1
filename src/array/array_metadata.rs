use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

use super::{ArrayShape, ChunkShape, FillValueMetadata};

/// Zarr V3 array metadata, the `zarr.json` document of an array.
///
/// An example `JSON` document for a sharded array:
/// ```json
/// {
///     "zarr_format": 3,
///     "node_type": "array",
///     "shape": [10000, 1000],
///     "data_type": "float64",
///     "chunk_grid": {
///         "name": "regular",
///         "configuration": {
///             "chunk_shape": [1000, 100]
///         }
///     },
///     "chunk_key_encoding": {
///         "name": "default",
///         "configuration": {
///             "separator": "/"
///         }
///     },
///     "codecs": [{
///         "name": "sharding_indexed",
///         "configuration": {
///             "chunk_shape": [100, 100],
///             "codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }],
///             "index_codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }]
///         }
///     }],
///     "fill_value": "NaN",
///     "attributes": {},
///     "dimension_names": ["y", "x"]
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadata {
    /// An integer defining the version of the storage specification to which the array adheres. Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// A string defining the type of hierarchy node element, must be `array` here.
    pub node_type: monostate::MustBe!("array"),
    /// An array of integers providing the length of each dimension of the Zarr array.
    pub shape: ArrayShape,
    /// The data type of the Zarr array.
    pub data_type: Metadata,
    /// The chunk grid of the Zarr array.
    pub chunk_grid: Metadata,
    /// The mapping from chunk grid cell coordinates to keys in the underlying store.
    pub chunk_key_encoding: Metadata,
    /// Provides an element value to use for uninitialised portions of the Zarr array.
    pub fill_value: FillValueMetadata,
    /// Specifies a list of codecs to be used for encoding and decoding chunks.
    pub codecs: Vec<Metadata>,
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// An optional list of dimension names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_names: Option<Vec<Option<String>>>,
}

/// The name of the only supported chunk grid.
pub(crate) const REGULAR_CHUNK_GRID: &str = "regular";

/// The configuration of a `regular` chunk grid.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct RegularChunkGridConfiguration {
    /// The chunk shape.
    pub chunk_shape: ChunkShape,
}

impl ArrayMetadata {
    /// Create array metadata.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        data_type: Metadata,
        chunk_grid: Metadata,
        chunk_key_encoding: Metadata,
        fill_value: FillValueMetadata,
        codecs: Vec<Metadata>,
        attributes: serde_json::Map<String, serde_json::Value>,
        dimension_names: Option<Vec<Option<String>>>,
    ) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("array"),
            shape,
            data_type,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes,
            dimension_names,
        }
    }

    /// Create the metadata of a `regular` chunk grid with `chunk_shape`.
    #[must_use]
    pub fn regular_chunk_grid(chunk_shape: &ChunkShape) -> Metadata {
        Metadata::new_with_serializable_configuration(
            REGULAR_CHUNK_GRID,
            &RegularChunkGridConfiguration {
                chunk_shape: chunk_shape.clone(),
            },
        )
        .unwrap_or_else(|_| Metadata::new(REGULAR_CHUNK_GRID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "zarr_format": 3,
        "node_type": "array",
        "shape": [100, 50],
        "data_type": "uint16",
        "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [10, 10]}},
        "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
        "fill_value": 0,
        "codecs": [{"name": "bytes", "configuration": {"endian": "little"}}],
        "dimension_names": ["y", null]
    }"#;

    #[test]
    fn array_metadata() {
        let metadata: ArrayMetadata = serde_json::from_str(JSON).unwrap();
        assert_eq!(metadata.shape, vec![100, 50]);
        assert_eq!(metadata.data_type.name(), "uint16");
        assert_eq!(
            metadata.dimension_names,
            Some(vec![Some("y".to_string()), None])
        );
        let configuration: RegularChunkGridConfiguration =
            metadata.chunk_grid.to_configuration().unwrap();
        assert_eq!(configuration.chunk_shape.to_array_shape(), vec![10, 10]);
        assert!(!metadata.to_string().contains("attributes"));
    }

    #[test]
    fn array_metadata_wrong_node_type() {
        let json = JSON.replace(r#""node_type": "array""#, r#""node_type": "group""#);
        assert!(serde_json::from_str::<ArrayMetadata>(&json).is_err());
        let json = JSON.replace(r#""zarr_format": 3"#, r#""zarr_format": 2"#);
        assert!(serde_json::from_str::<ArrayMetadata>(&json).is_err());
    }
}

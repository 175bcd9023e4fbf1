//! The `default` chunk key encoding.

use serde::{Deserialize, Serialize};

use crate::{metadata::Metadata, plugin::PluginCreateError};

use super::{
    join_indices, split_indices, ChunkKeyEncoding, ChunkKeyEncodingPlugin,
    ChunkKeyEncodingTraits, ChunkKeySeparator,
};

/// The identifier for the `default` chunk key encoding.
pub const IDENTIFIER: &str = "default";

// Register the chunk key encoding.
inventory::submit! {
    ChunkKeyEncodingPlugin::new(IDENTIFIER, is_name_default, create_chunk_key_encoding_default)
}

fn is_name_default(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_chunk_key_encoding_default(
    metadata: &Metadata,
) -> Result<ChunkKeyEncoding, PluginCreateError> {
    let configuration: DefaultChunkKeyEncodingConfiguration = metadata.to_configuration()?;
    Ok(ChunkKeyEncoding::new(DefaultChunkKeyEncoding::new(
        configuration.separator,
    )))
}

/// Configuration parameters for a `default` chunk key encoding.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct DefaultChunkKeyEncodingConfiguration {
    /// The chunk key separator. Defaults to `/`.
    #[serde(default = "default_separator")]
    pub separator: ChunkKeySeparator,
}

const fn default_separator() -> ChunkKeySeparator {
    ChunkKeySeparator::Slash
}

/// A `default` chunk key encoding.
///
/// The key for a chunk with grid index (k, j, i, …) is formed by taking the initial prefix `c`, and appending for each dimension:
/// - the separator character, followed by,
/// - the ASCII decimal string representation of the chunk index within that dimension.
///
/// The key of a rank 0 array's only chunk is `c`.
#[derive(Debug, Clone)]
pub struct DefaultChunkKeyEncoding {
    separator: ChunkKeySeparator,
}

impl DefaultChunkKeyEncoding {
    /// Create a new `default` chunk key encoding with separator `separator`.
    #[must_use]
    pub const fn new(separator: ChunkKeySeparator) -> Self {
        Self { separator }
    }

    /// Create a new `default` chunk key encoding with separator `.`.
    #[must_use]
    pub const fn new_dot() -> Self {
        Self::new(ChunkKeySeparator::Dot)
    }

    /// Create a new `default` chunk key encoding with separator `/`.
    #[must_use]
    pub const fn new_slash() -> Self {
        Self::new(ChunkKeySeparator::Slash)
    }
}

impl Default for DefaultChunkKeyEncoding {
    fn default() -> Self {
        Self::new_slash()
    }
}

impl ChunkKeyEncodingTraits for DefaultChunkKeyEncoding {
    fn create_metadata(&self) -> Metadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert(
            "separator".to_string(),
            serde_json::Value::String(self.separator.to_string()),
        );
        Metadata::new_with_configuration(IDENTIFIER, configuration)
    }

    fn encode(&self, chunk_grid_indices: &[u64]) -> String {
        if chunk_grid_indices.is_empty() {
            "c".to_string()
        } else {
            format!(
                "c{}{}",
                self.separator,
                join_indices(chunk_grid_indices, self.separator)
            )
        }
    }

    fn decode(&self, key: &str, dimensionality: usize) -> Option<Vec<u64>> {
        if dimensionality == 0 {
            return (key == "c").then(Vec::new);
        }
        let indices = key
            .strip_prefix('c')?
            .strip_prefix(self.separator.to_string().as_str())?;
        split_indices(indices, self.separator, dimensionality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_nd() {
        let encoding = DefaultChunkKeyEncoding::new_slash();
        assert_eq!(encoding.encode(&[1, 23, 45]), "c/1/23/45");
        assert_eq!(encoding.decode("c/1/23/45", 3), Some(vec![1, 23, 45]));
    }

    #[test]
    fn dot_nd() {
        let encoding = DefaultChunkKeyEncoding::new_dot();
        assert_eq!(encoding.encode(&[1, 23, 45]), "c.1.23.45");
        assert_eq!(encoding.decode("c.1.23.45", 3), Some(vec![1, 23, 45]));
        assert_eq!(encoding.decode("c/1/23/45", 3), None);
    }

    #[test]
    fn rank0() {
        let encoding = DefaultChunkKeyEncoding::new_slash();
        assert_eq!(encoding.encode(&[]), "c");
        assert_eq!(encoding.decode("c", 0), Some(vec![]));
        assert_eq!(encoding.decode("c/0", 0), None);
    }

    #[test]
    fn decode_rejects_mismatch() {
        let encoding = DefaultChunkKeyEncoding::new_slash();
        assert_eq!(encoding.decode("1/23", 2), None);
        assert_eq!(encoding.decode("c/1", 2), None);
        assert_eq!(encoding.decode("c/1/2/3", 2), None);
        assert_eq!(encoding.decode("c/1/+2", 2), None);
        assert_eq!(encoding.decode("zarr.json", 2), None);
    }

    #[test]
    fn metadata() {
        let metadata = DefaultChunkKeyEncoding::new_dot().create_metadata();
        assert_eq!(
            serde_json::to_string(&metadata).unwrap(),
            r#"{"name":"default","configuration":{"separator":"."}}"#
        );
        let encoding = ChunkKeyEncoding::from_metadata(&metadata).unwrap();
        assert_eq!(encoding.encode(&[1, 2]), "c.1.2");
        let encoding = ChunkKeyEncoding::from_metadata(&Metadata::new(IDENTIFIER)).unwrap();
        assert_eq!(encoding.encode(&[1, 2]), "c/1/2");
    }
}

//! The `v2` chunk key encoding.

use serde::{Deserialize, Serialize};

use crate::{metadata::Metadata, plugin::PluginCreateError};

use super::{
    join_indices, split_indices, ChunkKeyEncoding, ChunkKeyEncodingPlugin,
    ChunkKeyEncodingTraits, ChunkKeySeparator,
};

/// The identifier for the `v2` chunk key encoding.
pub const IDENTIFIER: &str = "v2";

// Register the chunk key encoding.
inventory::submit! {
    ChunkKeyEncodingPlugin::new(IDENTIFIER, is_name_v2, create_chunk_key_encoding_v2)
}

fn is_name_v2(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_chunk_key_encoding_v2(metadata: &Metadata) -> Result<ChunkKeyEncoding, PluginCreateError> {
    let configuration: V2ChunkKeyEncodingConfiguration = metadata.to_configuration()?;
    Ok(ChunkKeyEncoding::new(V2ChunkKeyEncoding::new(
        configuration.separator,
    )))
}

/// Configuration parameters for a `v2` chunk key encoding.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct V2ChunkKeyEncodingConfiguration {
    /// The chunk key separator. Defaults to `.`.
    #[serde(default = "default_separator")]
    pub separator: ChunkKeySeparator,
}

const fn default_separator() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

/// A `v2` chunk key encoding.
///
/// The key for a chunk with grid index (k, j, i, …) is the ASCII decimal string representation of each index joined by the separator.
/// The key of a rank 0 array's only chunk is `0`.
#[derive(Debug, Clone)]
pub struct V2ChunkKeyEncoding {
    separator: ChunkKeySeparator,
}

impl V2ChunkKeyEncoding {
    /// Create a new `v2` chunk key encoding with separator `separator`.
    #[must_use]
    pub const fn new(separator: ChunkKeySeparator) -> Self {
        Self { separator }
    }

    /// Create a new `v2` chunk key encoding with separator `.`.
    #[must_use]
    pub const fn new_dot() -> Self {
        Self::new(ChunkKeySeparator::Dot)
    }

    /// Create a new `v2` chunk key encoding with separator `/`.
    #[must_use]
    pub const fn new_slash() -> Self {
        Self::new(ChunkKeySeparator::Slash)
    }
}

impl Default for V2ChunkKeyEncoding {
    fn default() -> Self {
        Self::new_dot()
    }
}

impl ChunkKeyEncodingTraits for V2ChunkKeyEncoding {
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
            "0".to_string()
        } else {
            join_indices(chunk_grid_indices, self.separator)
        }
    }

    fn decode(&self, key: &str, dimensionality: usize) -> Option<Vec<u64>> {
        if dimensionality == 0 {
            return (key == "0").then(Vec::new);
        }
        split_indices(key, self.separator, dimensionality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_nd() {
        let encoding = V2ChunkKeyEncoding::new_dot();
        assert_eq!(encoding.encode(&[1, 23, 45]), "1.23.45");
        assert_eq!(encoding.decode("1.23.45", 3), Some(vec![1, 23, 45]));
        assert_eq!(encoding.decode("c.1.23.45", 3), None);
    }

    #[test]
    fn slash_nd() {
        let encoding = V2ChunkKeyEncoding::new_slash();
        assert_eq!(encoding.encode(&[1, 23, 45]), "1/23/45");
        assert_eq!(encoding.decode("1/23/45", 3), Some(vec![1, 23, 45]));
        assert_eq!(encoding.decode("1.23.45", 3), None);
    }

    #[test]
    fn rank0() {
        let encoding = V2ChunkKeyEncoding::default();
        assert_eq!(encoding.encode(&[]), "0");
        assert_eq!(encoding.decode("0", 0), Some(vec![]));
        assert_eq!(encoding.decode("c", 0), None);
    }

    #[test]
    fn metadata_default_separator() {
        let encoding = ChunkKeyEncoding::from_metadata(&Metadata::new(IDENTIFIER)).unwrap();
        assert_eq!(encoding.encode(&[4, 5]), "4.5");
    }
}

//! Chunk key encodings. Includes a [default](DefaultChunkKeyEncoding) and [v2](V2ChunkKeyEncoding) implementation.
//!
//! A chunk key encoding maps the indices of a chunk in the chunk grid to a key relative to the array prefix, and back.
//! For sharded arrays the encoded indices are those of a shard.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#chunk-key-encoding>.

mod default;
mod v2;

pub use default::{DefaultChunkKeyEncoding, DefaultChunkKeyEncodingConfiguration};
pub use v2::{V2ChunkKeyEncoding, V2ChunkKeyEncodingConfiguration};

use derive_more::{Deref, Display};

use crate::{
    metadata::Metadata,
    plugin::{create_from_registry, Plugin, PluginCreateError},
};

/// A chunk key encoding.
#[derive(Debug, Clone, Deref)]
pub struct ChunkKeyEncoding(Box<dyn ChunkKeyEncodingTraits>);

/// A chunk key encoding plugin.
pub type ChunkKeyEncodingPlugin = Plugin<ChunkKeyEncoding>;
inventory::collect!(ChunkKeyEncodingPlugin);

impl ChunkKeyEncoding {
    /// Create a chunk key encoding.
    pub fn new<T: ChunkKeyEncodingTraits + 'static>(chunk_key_encoding: T) -> Self {
        Self(Box::new(chunk_key_encoding))
    }

    /// Create a chunk key encoding from metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PluginCreateError`] if the metadata is invalid or not associated with a registered chunk key encoding plugin.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, PluginCreateError> {
        create_from_registry(inventory::iter::<ChunkKeyEncodingPlugin>, metadata, "chunk key encoding")
    }
}

/// Chunk key encoding traits.
pub trait ChunkKeyEncodingTraits: dyn_clone::DynClone + core::fmt::Debug + Send + Sync {
    /// Create the metadata of this chunk key encoding.
    fn create_metadata(&self) -> Metadata;

    /// Encode chunk grid indices into a key relative to the array prefix.
    fn encode(&self, chunk_grid_indices: &[u64]) -> String;

    /// Decode a key relative to the array prefix into chunk grid indices of an array with `dimensionality`.
    ///
    /// Returns [`None`] if `key` does not match this encoding.
    fn decode(&self, key: &str, dimensionality: usize) -> Option<Vec<u64>>;
}

dyn_clone::clone_trait_object!(ChunkKeyEncodingTraits);

/// A chunk key separator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ChunkKeySeparator {
    /// The slash '/' character.
    #[display("/")]
    Slash,
    /// The dot '.' character.
    #[display(".")]
    Dot,
}

impl ChunkKeySeparator {
    const fn as_char(self) -> char {
        match self {
            Self::Slash => '/',
            Self::Dot => '.',
        }
    }
}

impl TryFrom<char> for ChunkKeySeparator {
    type Error = char;

    fn try_from(separator: char) -> Result<Self, Self::Error> {
        match separator {
            '/' => Ok(Self::Slash),
            '.' => Ok(Self::Dot),
            _ => Err(separator),
        }
    }
}

impl serde::Serialize for ChunkKeySeparator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_char(self.as_char())
    }
}

impl<'de> serde::Deserialize<'de> for ChunkKeySeparator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(d)?;
        if let serde_json::Value::String(separator) = value {
            if separator == "/" {
                return Ok(Self::Slash);
            } else if separator == "." {
                return Ok(Self::Dot);
            }
        }
        Err(serde::de::Error::custom(
            "chunk key separator must be a `.` or `/`.",
        ))
    }
}

/// Join chunk grid indices with `separator`.
fn join_indices(chunk_grid_indices: &[u64], separator: ChunkKeySeparator) -> String {
    chunk_grid_indices
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Split `indices` on `separator` into exactly `dimensionality` decimal indices.
fn split_indices(
    indices: &str,
    separator: ChunkKeySeparator,
    dimensionality: usize,
) -> Option<Vec<u64>> {
    let chunk_grid_indices = indices
        .split(separator.as_char())
        .map(|index| {
            if !index.is_empty() && index.bytes().all(|byte| byte.is_ascii_digit()) {
                index.parse::<u64>().ok()
            } else {
                None
            }
        })
        .collect::<Option<Vec<u64>>>()?;
    (chunk_grid_indices.len() == dimensionality).then_some(chunk_grid_indices)
}

use crate::{
    array::ArrayMetadata,
    group::GroupMetadata,
    storage::{ReadableStorageTraits, StorageError},
};

use super::NodePath;

/// Node metadata ([`ArrayMetadata`] or [`GroupMetadata`]).
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum NodeMetadata {
    /// Array metadata.
    Array(ArrayMetadata),

    /// Group metadata.
    Group(GroupMetadata),
}

impl NodeMetadata {
    /// Read the metadata of the node at `path`, [`None`] if the node has no metadata document.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the document cannot be read or is neither array nor group metadata.
    pub fn read<TStorage: ?Sized + ReadableStorageTraits>(
        storage: &TStorage,
        path: &NodePath,
    ) -> Result<Option<Self>, StorageError> {
        let key = path.meta_key()?;
        let Some(bytes) = storage.get(&key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StorageError::Other(format!("invalid metadata at {key}: {err}")))
    }
}

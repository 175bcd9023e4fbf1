use std::sync::Arc;

use super::{Group, GroupCreateError, GroupMetadata};

/// Prepares the metadata of a new [`Group`].
///
/// Building does not touch the store, call [`Group::store_metadata`] to persist the group.
#[derive(Debug, Default)]
pub struct GroupBuilder {
    metadata: GroupMetadata,
}

impl GroupBuilder {
    /// Create a builder for a group without attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all attributes.
    pub fn attributes(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        self.metadata.attributes = attributes;
        self
    }

    /// Set the attribute `name` to `value`.
    pub fn attribute(&mut self, name: &str, value: impl Into<serde_json::Value>) -> &mut Self {
        self.metadata.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Create the group at `path` in `storage`.
    ///
    /// # Errors
    /// Returns [`GroupCreateError`] if `path` is not a valid node path.
    pub fn build<TStorage: ?Sized>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
    ) -> Result<Group<TStorage>, GroupCreateError> {
        Group::new_with_metadata(storage, path, self.metadata.clone())
    }
}

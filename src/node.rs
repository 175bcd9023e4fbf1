//! Hierarchy node paths and metadata.
//!
//! Arrays and groups are addressed by a [`NodePath`], an absolute `/`-separated path from the store root.

mod node_metadata;

use derive_more::Display;
use thiserror::Error;

pub use node_metadata::NodeMetadata;

use crate::storage::{StoreKey, StoreKeyError, StorePrefix};

/// A hierarchy node path.
///
/// See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#path>.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Debug, Error)]
#[error("invalid node path {0}")]
pub struct NodePathError(String);

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// The root node.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Extracts a string slice containing the node path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a path:
    /// - a path always starts with `/`,
    /// - a non-root path cannot end with `/`, and
    /// - there are no empty node names (i.e. a `//` substring).
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path.eq("/") || (path.starts_with('/') && !path.ends_with('/') && !path.contains("//"))
    }

    /// Returns true if this is the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The name of the node, the empty string for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// The parent of the node, [`None`] for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(position) => Some(Self(self.0[..position].to_string())),
        }
    }

    /// Append a child `name` to the path.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if `name` is empty or contains `/`.
    pub fn child(&self, name: &str) -> Result<Self, NodePathError> {
        if name.is_empty() || name.contains('/') {
            return Err(NodePathError(format!("{}/{name}", self.0)));
        }
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// Resolve a relative `/`-separated path (e.g. `ovr_2x/data`) against this node.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if any component of `relative` is empty.
    pub fn join(&self, relative: &str) -> Result<Self, NodePathError> {
        relative
            .split('/')
            .try_fold(self.clone(), |path, name| path.child(name))
    }

    /// The store prefix of the node (empty for the root).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreKeyError`] if the prefix is invalid.
    pub fn store_prefix(&self) -> Result<StorePrefix, StoreKeyError> {
        if self.is_root() {
            StorePrefix::new("")
        } else {
            StorePrefix::new(format!("{}/", self.0.trim_start_matches('/')))
        }
    }

    /// The store key of the metadata document of the node (`zarr.json`).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreKeyError`] if the key is invalid.
    pub fn meta_key(&self) -> Result<StoreKey, StoreKeyError> {
        StoreKey::new(format!("{}zarr.json", self.store_prefix()?.as_str()))
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_path() {
        assert!(NodePath::new("/").is_ok());
        assert!(NodePath::new("/a/b").is_ok());
        assert_eq!(NodePath::new("/a/b").unwrap().to_string(), "/a/b");
        assert!(NodePath::new("/a/b/").is_err());
        assert_eq!(
            NodePath::new("/a/b/").unwrap_err().to_string(),
            "invalid node path /a/b/"
        );
        assert!(NodePath::new("/a//b").is_err());
        assert!(NodePath::new("a").is_err());
    }

    #[test]
    fn node_path_navigation() {
        let path = NodePath::new("/group/array").unwrap();
        assert_eq!(path.name(), "array");
        assert_eq!(path.parent().unwrap().as_str(), "/group");
        assert_eq!(path.parent().unwrap().parent().unwrap(), NodePath::root());
        assert!(NodePath::root().parent().is_none());
        assert_eq!(NodePath::root().child("a").unwrap().as_str(), "/a");
        assert_eq!(
            NodePath::new("/group").unwrap().join("ovr_2x/data").unwrap().as_str(),
            "/group/ovr_2x/data"
        );
        assert!(NodePath::root().child("a/b").is_err());
    }

    #[test]
    fn node_path_keys() {
        let path = NodePath::new("/group/array").unwrap();
        assert_eq!(path.store_prefix().unwrap().as_str(), "group/array/");
        assert_eq!(path.meta_key().unwrap().as_str(), "group/array/zarr.json");
        assert_eq!(NodePath::root().meta_key().unwrap().as_str(), "zarr.json");
    }
}

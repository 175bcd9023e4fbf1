//! Zarr groups.
//!
//! A Zarr group is a node in a Zarr hierarchy.
//! It can have associated metadata and may have child nodes (groups or [`arrays`](crate::array)).
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#group>.
//!
//! Use [`GroupBuilder`] to setup a new group, or use [`Group::open`] to read and/or write an existing group.
//!
//! A group can optionally store attributes in metadata in an accompanying `zarr.json` file. For example:
//! ```json
//! {
//!     "zarr_format": 3,
//!     "node_type": "group",
//!     "attributes": {
//!         "spam": "ham",
//!         "eggs": 42,
//!     }
//! }
//! ```
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#group-metadata> for more information on group metadata.
//!
//! A group can describe a pyramid of its arrays and their downsampled copies in child groups with a [`multiscales`] attribute.

mod group_builder;
mod group_metadata;
pub mod multiscales;

use std::{collections::BTreeMap, sync::Arc};

use thiserror::Error;

use crate::{
    array::ArrayMetadata,
    node::{NodeMetadata, NodePath, NodePathError},
    storage::{
        ReadableStorageTraits, ReadableWritableListableStorageTraits, StorageError,
        WritableStorageTraits,
    },
};

pub use self::{group_builder::GroupBuilder, group_metadata::GroupMetadata};

use self::multiscales::{
    is_multiscales_convention, multiscales_convention, MultiscalesLevel, MultiscalesMetadata,
    MultiscalesTransform, MULTISCALES_ATTRIBUTE, ZARR_CONVENTIONS_ATTRIBUTE,
};

/// A group.
#[derive(Clone, Debug)]
pub struct Group<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the group in the store.
    path: NodePath,
    /// The metadata.
    metadata: GroupMetadata,
}

/// A group creation error.
#[derive(Debug, Error)]
pub enum GroupCreateError {
    /// An invalid node path
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The node is an array.
    #[error("node at {_0} is not a group")]
    NotAGroup(NodePath),
}

impl<TStorage: ?Sized> Group<TStorage> {
    /// Create a group in `storage` at `path` with `metadata`.
    /// This does **not** write to the store, use [`store_metadata`](Group<WritableStorageTraits>::store_metadata) to write `metadata` to `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`GroupCreateError`] if the path is invalid.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: &str,
        metadata: GroupMetadata,
    ) -> Result<Self, GroupCreateError> {
        Ok(Self {
            storage,
            path: NodePath::new(path)?,
            metadata,
        })
    }

    /// Get path.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get attributes.
    #[must_use]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata.attributes
    }

    /// Mutably borrow the group attributes.
    #[must_use]
    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.metadata.attributes
    }

    /// Get metadata.
    #[must_use]
    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    /// Get the `multiscales` attribute, [`None`] if it is absent, invalid, or the multiscales convention is not declared.
    #[must_use]
    pub fn multiscales(&self) -> Option<MultiscalesMetadata> {
        let declared = self
            .metadata
            .attributes
            .get(ZARR_CONVENTIONS_ATTRIBUTE)
            .and_then(serde_json::Value::as_array)
            .is_some_and(|conventions| conventions.iter().any(is_multiscales_convention));
        if !declared {
            return None;
        }
        let multiscales = self.metadata.attributes.get(MULTISCALES_ATTRIBUTE)?;
        match serde_json::from_value(multiscales.clone()) {
            Ok(multiscales) => Some(multiscales),
            Err(err) => {
                log::warn!("ignoring invalid multiscales of group {}: {err}", self.path);
                None
            }
        }
    }

    /// Replace the multiscales entry of the `zarr_conventions` attribute, keeping other entries.
    fn replace_multiscales_convention(&mut self, convention: Option<serde_json::Value>) {
        let mut conventions: Vec<serde_json::Value> = match self
            .metadata
            .attributes
            .remove(ZARR_CONVENTIONS_ATTRIBUTE)
        {
            Some(serde_json::Value::Array(conventions)) => conventions
                .into_iter()
                .filter(|convention| !is_multiscales_convention(convention))
                .collect(),
            _ => Vec::new(),
        };
        conventions.extend(convention);
        if !conventions.is_empty() {
            self.metadata.attributes.insert(
                ZARR_CONVENTIONS_ATTRIBUTE.to_string(),
                serde_json::Value::Array(conventions),
            );
        }
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Group<TStorage> {
    /// Open the group in `storage` at `path`. The metadata is read from the store.
    ///
    /// A path without metadata is an implicit group with no attributes.
    ///
    /// # Errors
    ///
    /// Returns [`GroupCreateError`] if there is a storage error, the metadata is invalid, or the node is an array.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupCreateError> {
        let node_path = NodePath::new(path)?;
        let metadata = match NodeMetadata::read(&*storage, &node_path)? {
            Some(NodeMetadata::Group(metadata)) => metadata,
            Some(NodeMetadata::Array(_)) => return Err(GroupCreateError::NotAGroup(node_path)),
            None => GroupMetadata::default(),
        };
        Self::new_with_metadata(storage, path, metadata)
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Group<TStorage> {
    /// Create a group in `storage` at `path` with no attributes and store its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GroupCreateError`] if the path is invalid or there is a storage error.
    pub fn create(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupCreateError> {
        let group = GroupBuilder::new().build(storage, path)?;
        group.store_metadata()?;
        Ok(group)
    }

    /// Store metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(&self.metadata)
            .map_err(|err| StorageError::Other(err.to_string()))?;
        self.storage.set(&self.path.meta_key()?, json.into())
    }
}

/// A level of a pyramid found while generating multiscales metadata.
struct Level {
    /// The child group holding the level, [`None`] for the base in this group.
    group: Option<String>,
    metadata: ArrayMetadata,
}

impl Level {
    fn num_elements(&self) -> u64 {
        self.metadata.shape.iter().product()
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Group<TStorage> {
    /// The names and metadata of the child nodes with metadata.
    fn children(&self) -> Result<Vec<(String, NodeMetadata)>, StorageError> {
        let prefix = self.path.store_prefix()?;
        let mut children = Vec::new();
        for child in self.storage.list_dir(&prefix)?.prefixes() {
            let Some(name) = child
                .as_str()
                .strip_prefix(prefix.as_str())
                .map(|name| name.trim_end_matches('/'))
            else {
                continue;
            };
            if let Some(metadata) = NodeMetadata::read(&*self.storage, &self.path.child(name)?)? {
                children.push((name.to_string(), metadata));
            }
        }
        children.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(children)
    }

    /// Return the names of the child groups, sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be listed or child metadata is invalid.
    pub fn group_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .children()?
            .into_iter()
            .filter_map(|(name, metadata)| matches!(metadata, NodeMetadata::Group(_)).then_some(name))
            .collect())
    }

    /// Return the names of the child arrays, sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be listed or child metadata is invalid.
    pub fn array_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .children()?
            .into_iter()
            .filter_map(|(name, metadata)| matches!(metadata, NodeMetadata::Array(_)).then_some(name))
            .collect())
    }

    /// Delete the child group `name` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if `name` is invalid or there is an underlying store error.
    pub fn delete_group(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path.child(name)?;
        log::debug!("deleting group {path}");
        self.storage.erase_prefix(&path.store_prefix()?)
    }

    /// Write the `multiscales` attribute describing the pyramid formed by the arrays of this group and its child groups, and store the metadata.
    ///
    /// Without child groups, the `multiscales` attribute and its `zarr_conventions` entry are removed.
    /// Otherwise, the pyramid is that of the first array name (alphabetically) found in at least two levels with at least two dimensions, where a level is this group or a child group.
    /// Levels are ordered by element count, largest first, and each level after the first is described relative to the previous one.
    /// Levels with a different dimensionality or data type than the largest level are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying store error or child metadata is invalid.
    pub fn generate_multiscales_metadata(
        &mut self,
        resampling: Option<&str>,
    ) -> Result<(), StorageError> {
        let group_names = self.group_names()?;
        if group_names.is_empty() {
            self.metadata.attributes.remove(MULTISCALES_ATTRIBUTE);
            self.replace_multiscales_convention(None);
            return self.store_metadata();
        }

        let mut levels: BTreeMap<String, Vec<Level>> = BTreeMap::new();
        for group_name in group_names {
            let group = Group::open(self.storage.clone(), self.path.child(&group_name)?.as_str())
                .map_err(|err| StorageError::Other(err.to_string()))?;
            for (array_name, metadata) in group.children()? {
                if let NodeMetadata::Array(metadata) = metadata {
                    levels.entry(array_name).or_default().push(Level {
                        group: Some(group_name.clone()),
                        metadata,
                    });
                }
            }
        }
        for (array_name, array_levels) in &mut levels {
            let path = self.path.child(array_name)?;
            if let Some(NodeMetadata::Array(metadata)) = NodeMetadata::read(&*self.storage, &path)? {
                array_levels.insert(
                    0,
                    Level {
                        group: None,
                        metadata,
                    },
                );
            }
        }

        let Some((array_name, mut levels)) = levels
            .into_iter()
            .find(|(_, levels)| levels.len() >= 2 && levels[0].metadata.shape.len() >= 2)
        else {
            log::debug!(
                "group {} has no array with at least two levels and two dimensions",
                self.path
            );
            return Ok(());
        };
        levels.sort_by_key(|level| std::cmp::Reverse(level.num_elements()));

        let asset = |level: &Level| level.group.clone().unwrap_or_else(|| array_name.clone());
        let base = &levels[0];
        let dimensionality = base.metadata.shape.len();
        let mut layout = vec![MultiscalesLevel {
            asset: asset(base),
            derived_from: None,
            transform: MultiscalesTransform {
                scale: vec![1.0; dimensionality],
                translation: None,
            },
            resampling_method: None,
        }];
        let mut previous = base;
        for level in &levels[1..] {
            if level.metadata.shape.len() != dimensionality
                || level.metadata.data_type != base.metadata.data_type
            {
                log::debug!(
                    "skipping level {} of group {} with a different dimensionality or data type",
                    asset(level),
                    self.path
                );
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let scale = std::iter::zip(&level.metadata.shape, &previous.metadata.shape)
                .map(|(&size, &previous_size)| {
                    if size > 0 {
                        previous_size as f64 / size as f64
                    } else {
                        0.0
                    }
                })
                .collect();
            layout.push(MultiscalesLevel {
                asset: asset(level),
                derived_from: Some(asset(previous)),
                transform: MultiscalesTransform {
                    scale,
                    translation: Some(vec![0.0; dimensionality]),
                },
                resampling_method: resampling.map(str::to_string),
            });
            previous = level;
        }
        if layout.len() < 2 {
            return Ok(());
        }

        let multiscales = serde_json::to_value(MultiscalesMetadata { layout })
            .map_err(|err| StorageError::Other(err.to_string()))?;
        self.replace_multiscales_convention(Some(multiscales_convention()));
        self.metadata
            .attributes
            .insert(MULTISCALES_ATTRIBUTE.to_string(), multiscales);
        self.store_metadata()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        array::{ArrayBuilder, DataType, FillValue},
        storage::store::MemoryStore,
    };

    use super::*;

    const JSON_VALID: &str = r#"{
    "zarr_format": 3,
    "node_type": "group",
    "attributes": {
        "spam": "ham",
        "eggs": 42
    }
}"#;

    #[test]
    fn group_metadata_write_read() {
        let store = Arc::new(MemoryStore::new());
        let group_metadata: GroupMetadata = serde_json::from_str(JSON_VALID).unwrap();
        let group = Group::new_with_metadata(store.clone(), "/group", group_metadata).unwrap();
        group.store_metadata().unwrap();
        let opened = Group::open(store.clone(), "/group").unwrap();
        assert_eq!(opened.metadata(), group.metadata());
        assert_eq!(opened.attributes()["eggs"], 42);

        let implicit = Group::open(store, "/implicit").unwrap();
        assert!(implicit.attributes().is_empty());
    }

    #[test]
    fn group_open_array() {
        let store = Arc::new(MemoryStore::new());
        let mut array = ArrayBuilder::new(vec![4], DataType::UInt8, vec![2], FillValue::from(0u8))
            .build(store.clone(), "/array")
            .unwrap();
        array.store_metadata().unwrap();
        assert!(matches!(
            Group::open(store, "/array"),
            Err(GroupCreateError::NotAGroup(_))
        ));
    }

    #[test]
    fn group_children() {
        let store = Arc::new(MemoryStore::new());
        let root = Group::create(store.clone(), "/").unwrap();
        Group::create(store.clone(), "/b").unwrap();
        Group::create(store.clone(), "/a").unwrap();
        Group::create(store.clone(), "/a/nested").unwrap();
        let mut array = ArrayBuilder::new(vec![4], DataType::UInt8, vec![2], FillValue::from(0u8))
            .build(store.clone(), "/data")
            .unwrap();
        array.store_metadata().unwrap();
        array.store_chunk(&[0], vec![1, 2]).unwrap();
        array.flush().unwrap();

        assert_eq!(root.group_names().unwrap(), vec!["a", "b"]);
        assert_eq!(root.array_names().unwrap(), vec!["data"]);

        root.delete_group("a").unwrap();
        assert_eq!(root.group_names().unwrap(), vec!["b"]);
        assert!(Group::open(store.clone(), "/a/nested")
            .unwrap()
            .attributes()
            .is_empty());
        assert!(root.delete_group("a/b").is_err());
    }

    fn store_array(store: &Arc<MemoryStore>, path: &str, shape: Vec<u64>, data_type: DataType) {
        let fill_value = FillValue::zero(data_type.size());
        let mut array = ArrayBuilder::new(shape.clone(), data_type, shape, fill_value)
            .build(store.clone(), path)
            .unwrap();
        array.store_metadata().unwrap();
    }

    #[test]
    fn group_multiscales() {
        let store = Arc::new(MemoryStore::new());
        let mut group = GroupBuilder::new()
            .attributes(
                serde_json::json!({"zarr_conventions": [{"name": "spatial"}]})
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .build(store.clone(), "/group")
            .unwrap();
        group.store_metadata().unwrap();
        store_array(&store, "/group/data", vec![100, 80], DataType::Float32);
        store_array(&store, "/group/x", vec![80], DataType::Float64);
        for (name, shape) in [("ovr_4x", vec![25, 20]), ("ovr_2x", vec![50, 40])] {
            Group::create(store.clone(), &format!("/group/{name}")).unwrap();
            store_array(&store, &format!("/group/{name}/data"), shape, DataType::Float32);
            store_array(&store, &format!("/group/{name}/x"), vec![40], DataType::Float64);
        }
        Group::create(store.clone(), "/group/other").unwrap();
        store_array(&store, "/group/other/data", vec![10, 10], DataType::UInt8);

        group.generate_multiscales_metadata(Some("NEAREST")).unwrap();
        let group = Group::open(store.clone(), "/group").unwrap();
        let multiscales = group.multiscales().unwrap();
        let assets: Vec<_> = multiscales.layout.iter().map(|level| level.asset.as_str()).collect();
        assert_eq!(assets, vec!["data", "ovr_2x", "ovr_4x"]);
        assert_eq!(multiscales.layout[2].derived_from.as_deref(), Some("ovr_2x"));
        assert_eq!(multiscales.layout[1].transform.scale, vec![2.0, 2.0]);
        assert_eq!(
            multiscales.layout[1].resampling_method.as_deref(),
            Some("NEAREST")
        );
        let conventions = group.attributes()[ZARR_CONVENTIONS_ATTRIBUTE].as_array().unwrap();
        assert_eq!(conventions.len(), 2);

        let mut group = group;
        for name in ["ovr_2x", "ovr_4x", "other"] {
            group.delete_group(name).unwrap();
        }
        group.generate_multiscales_metadata(None).unwrap();
        let group = Group::open(store, "/group").unwrap();
        assert!(group.multiscales().is_none());
        assert!(!group.attributes().contains_key(MULTISCALES_ATTRIBUTE));
        assert_eq!(
            group.attributes()[ZARR_CONVENTIONS_ATTRIBUTE],
            serde_json::json!([{"name": "spatial"}])
        );
    }
}

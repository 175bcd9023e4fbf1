//! Storage backends.
//!
//! A store is a system that can be used to store and retrieve the values of a hierarchy of arrays and groups, addressed by [`StoreKey`].
//! This module defines the abstract store interfaces and includes a [`FilesystemStore`](store::FilesystemStore) and a [`MemoryStore`](store::MemoryStore).
//!
//! The interface mirrors the operations the engine needs:
//!  - [`ReadableStorageTraits::get`] reads a whole value sequentially (the preferred access pattern for whole chunks),
//!  - [`ReadableStorageTraits::get_partial_values_key`] reads byte ranges of a value (the preferred access pattern for shard indexes and inner chunks),
//!  - [`WritableStorageTraits::set`] writes a whole value, creating any intermediate directories,
//!  - [`WritableStorageTraits::erase`] deletes a value, and
//!  - [`ListableStorageTraits`] lists keys and child prefixes.
//!
//! A value that does not exist is never an error: reads return [`None`] and erasing a missing value succeeds.

mod store_key;
pub mod store;

use thiserror::Error;

use crate::{
    byte_range::{ByteRange, InvalidByteRangeError},
    node::NodePathError,
};

pub use store_key::{StoreKey, StoreKeyError, StoreKeys, StorePrefix, StorePrefixes};

/// Bytes retrieved from a store.
pub type Bytes = bytes::Bytes;

/// An alias for bytes which may or may not be available.
pub type MaybeBytes = Option<Bytes>;

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error on a key or path.
    #[error("{path}: {source}")]
    IOError {
        /// The key or filesystem path being accessed.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },
    /// An invalid store key or prefix.
    #[error(transparent)]
    InvalidStoreKey(#[from] StoreKeyError),
    /// An invalid node path.
    #[error(transparent)]
    InvalidNodePath(#[from] NodePathError),
    /// An invalid byte range.
    #[error(transparent)]
    InvalidByteRange(#[from] InvalidByteRangeError),
    /// Any other error.
    #[error("{_0}")]
    Other(String),
}

impl StorageError {
    /// Create an [`StorageError::IOError`] naming the offending `path`.
    #[must_use]
    pub fn io(path: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::IOError {
            path: path.to_string(),
            source,
        }
    }
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the whole value associated with a given key.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self
            .get_partial_values_key(key, &[ByteRange::FromStart(0, None)])?
            .and_then(|mut values| values.pop()))
    }

    /// Retrieve byte ranges of the value associated with a given key, seeking within the value.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error or a byte range is invalid.
    fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError>;

    /// Return the size in bytes of the value at `key`, or [`None`] if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;

    /// Returns true if a value exists at `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn exists(&self, key: &StoreKey) -> Result<bool, StorageError> {
        Ok(self.size_key(key)?.is_some())
    }
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Store bytes at a [`StoreKey`], creating intermediate directories if the store has them.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on failure to store.
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError>;

    /// Erase a [`StoreKey`].
    ///
    /// Succeeds if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Erase all [`StoreKey`] under [`StorePrefix`].
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError>;

    /// Returns true if the store rejects writes.
    fn readonly(&self) -> bool {
        false
    }
}

/// Listable storage traits.
pub trait ListableStorageTraits: Send + Sync {
    /// Retrieve all [`StoreKeys`] with a given [`StorePrefix`].
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;

    /// Retrieve all [`StoreKeys`] and [`StorePrefixes`] which are direct children of [`StorePrefix`].
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;
}

/// A supertrait of [`ReadableStorageTraits`], [`WritableStorageTraits`] and [`ListableStorageTraits`].
pub trait ReadableWritableListableStorageTraits:
    ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

impl<T> ReadableWritableListableStorageTraits for T where
    T: ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

/// [`StoreKeys`] and [`StorePrefixes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreKeysPrefixes {
    keys: StoreKeys,
    prefixes: StorePrefixes,
}

impl StoreKeysPrefixes {
    /// Create a new [`StoreKeysPrefixes`].
    #[must_use]
    pub fn new(keys: StoreKeys, prefixes: StorePrefixes) -> Self {
        Self { keys, prefixes }
    }

    /// Returns the keys.
    #[must_use]
    pub const fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// Returns the prefixes.
    #[must_use]
    pub const fn prefixes(&self) -> &StorePrefixes {
        &self.prefixes
    }
}

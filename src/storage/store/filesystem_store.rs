//! A filesystem store.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/stores/filesystem/v1.0.html>.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    byte_range::{ByteRange, InvalidByteRangeError},
    storage::{
        Bytes, ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
        StoreKeysPrefixes, StorePrefix, StorePrefixes, WritableStorageTraits,
    },
};

/// A synchronous file system store.
///
/// Each value is a file below `base_path`. Writes create intermediate directories and replace the whole file.
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    readonly: bool,
    files: Mutex<HashMap<StoreKey, Arc<RwLock<()>>>>,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid base directory.
    #[error("base path {0} is not valid")]
    InvalidBasePath(PathBuf),
}

impl FilesystemStore {
    /// Create a new file system store at a given `base_path`.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_path`:
    ///   - is not valid UTF-8, or
    ///   - cannot be created.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() {
            return Err(FilesystemStoreCreateError::InvalidBasePath(base_path));
        }
        let readonly = if base_path.exists() {
            std::fs::metadata(&base_path)?.permissions().readonly()
        } else {
            std::fs::create_dir_all(&base_path)?;
            false
        };
        Ok(Self {
            base_path,
            readonly,
            files: Mutex::default(),
        })
    }

    /// Create a new read only file system store at a given `base_path`.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_path` is not valid UTF-8.
    pub fn new_read_only<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() {
            return Err(FilesystemStoreCreateError::InvalidBasePath(base_path));
        }
        Ok(Self {
            base_path,
            readonly: true,
            files: Mutex::default(),
        })
    }

    /// Maps a [`StoreKey`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    /// Maps a filesystem path below the base path to a [`StoreKey`].
    fn fspath_to_key(&self, path: &Path) -> Option<StoreKey> {
        let relative = pathdiff::diff_paths(path, &self.base_path)?;
        let components: Vec<_> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        StoreKey::new(components.join("/")).ok()
    }

    /// Maps a [`StorePrefix`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn prefix_to_fspath(&self, prefix: &StorePrefix) -> PathBuf {
        self.base_path.join(prefix.as_str())
    }

    /// Return the lock of the file at `key`.
    ///
    /// Locks no longer held outside of the map are dropped, so the map only grows with concurrent access.
    fn get_file_mutex(&self, key: &StoreKey) -> Arc<RwLock<()>> {
        let mut files = self.files.lock();
        files.retain(|_, file| Arc::strong_count(file) > 1);
        files
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::default()))
            .clone()
    }

    fn read_byte_range(
        file: &mut File,
        file_size: u64,
        byte_range: &ByteRange,
    ) -> std::io::Result<Vec<u8>> {
        let start = byte_range.start(file_size);
        file.seek(SeekFrom::Start(start))?;
        let length = usize::try_from(byte_range.length(file_size))
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
        let mut buffer = vec![0; length];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

impl ReadableStorageTraits for FilesystemStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Bytes>, StorageError> {
        let file = self.get_file_mutex(key);
        let _lock = file.read();
        let path = self.key_to_fspath(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(path.display(), err)),
        }
    }

    fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError> {
        let file = self.get_file_mutex(key);
        let _lock = file.read();
        let path = self.key_to_fspath(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(path.display(), err)),
        };
        let file_size = file
            .metadata()
            .map_err(|err| StorageError::io(path.display(), err))?
            .len();

        let mut out = Vec::with_capacity(byte_ranges.len());
        for byte_range in byte_ranges {
            if !byte_range.is_within(file_size) {
                return Err(InvalidByteRangeError::new(*byte_range, file_size).into());
            }
            let bytes = Self::read_byte_range(&mut file, file_size, byte_range)
                .map_err(|err| StorageError::io(path.display(), err))?;
            out.push(Bytes::from(bytes));
        }
        Ok(Some(out))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let path = self.key_to_fspath(key);
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(path.display(), err)),
        }
    }
}

impl WritableStorageTraits for FilesystemStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        if self.readonly {
            return Err(StorageError::ReadOnly);
        }
        let file = self.get_file_mutex(key);
        let _lock = file.write();

        let path = self.key_to_fspath(key);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| StorageError::io(parent.display(), err))?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|err| StorageError::io(path.display(), err))?;
        file.write_all(&value)
            .map_err(|err| StorageError::io(path.display(), err))
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        if self.readonly {
            return Err(StorageError::ReadOnly);
        }
        let file = self.get_file_mutex(key);
        let _lock = file.write();
        let path = self.key_to_fspath(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(path.display(), err)),
        }
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        if self.readonly {
            return Err(StorageError::ReadOnly);
        }
        let _lock = self.files.lock();
        let path = self.prefix_to_fspath(prefix);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(path.display(), err)),
        }
    }

    fn readonly(&self) -> bool {
        self.readonly
    }
}

impl ListableStorageTraits for FilesystemStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(WalkDir::new(self.prefix_to_fspath(prefix))
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.fspath_to_key(entry.path()))
            .collect())
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let path = self.prefix_to_fspath(prefix);
        let mut keys: StoreKeys = vec![];
        let mut prefixes: StorePrefixes = vec![];
        let dir = match std::fs::read_dir(&path) {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreKeysPrefixes::default())
            }
            Err(err) => return Err(StorageError::io(path.display(), err)),
        };
        for entry in dir {
            let entry = entry.map_err(|err| StorageError::io(path.display(), err))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                prefixes.push(StorePrefix::new(format!("{}{name}/", prefix.as_str()))?);
            } else {
                keys.push(StoreKey::new(format!("{}{name}", prefix.as_str()))?);
            }
        }
        keys.sort();
        prefixes.sort();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_set_get_erase() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        let key = StoreKey::new("a/b/c")?;
        assert!(store.get(&key)?.is_none());
        store.set(&key, Bytes::from_static(&[0, 1, 2, 3]))?;
        assert!(path.path().join("a").join("b").join("c").is_file());
        assert_eq!(store.get(&key)?.unwrap().as_ref(), &[0, 1, 2, 3]);
        assert_eq!(store.size_key(&key)?, Some(4));
        assert_eq!(
            store.get_partial_values_key(
                &key,
                &[ByteRange::FromStart(1, Some(2)), ByteRange::FromEnd(0, Some(1))]
            )?,
            Some(vec![Bytes::from_static(&[1, 2]), Bytes::from_static(&[3])])
        );
        assert!(store
            .get_partial_values_key(&key, &[ByteRange::FromStart(3, Some(2))])
            .is_err());
        store.erase(&key)?;
        store.erase(&key)?;
        assert!(store.get(&key)?.is_none());
        Ok(())
    }

    #[test]
    fn filesystem_list() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        store.set(&StoreKey::new("a/zarr.json")?, Bytes::from_static(b"{}"))?;
        store.set(&StoreKey::new("a/c/0/0")?, Bytes::new())?;
        store.set(&StoreKey::new("a/c/0/1")?, Bytes::new())?;
        store.set(&StoreKey::new("b/zarr.json")?, Bytes::from_static(b"{}"))?;

        let prefix = StorePrefix::new("a/")?;
        assert_eq!(
            store.list_prefix(&prefix)?,
            vec![
                StoreKey::new("a/c/0/0")?,
                StoreKey::new("a/c/0/1")?,
                StoreKey::new("a/zarr.json")?
            ]
        );
        let list_dir = store.list_dir(&StorePrefix::root())?;
        assert!(list_dir.keys().is_empty());
        assert_eq!(
            list_dir.prefixes(),
            &vec![StorePrefix::new("a/")?, StorePrefix::new("b/")?]
        );

        store.erase_prefix(&prefix)?;
        assert!(store.list_prefix(&prefix)?.is_empty());
        Ok(())
    }

    #[test]
    fn filesystem_read_only() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new_read_only(path.path())?;
        assert!(store.readonly());
        assert!(matches!(
            store.set(&StoreKey::new("a")?, Bytes::new()),
            Err(StorageError::ReadOnly)
        ));
        Ok(())
    }

    #[test]
    fn filesystem_file_locks_released() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        for i in 0..100 {
            let key = StoreKey::new(format!("c/{i}"))?;
            store.set(&key, Bytes::from_static(&[1]))?;
            assert!(store.get(&key)?.is_some());
            store.erase(&key)?;
        }
        assert!(store.files.lock().len() <= 1);

        let held = store.get_file_mutex(&StoreKey::new("held")?);
        store.get(&StoreKey::new("other")?)?;
        let files = store.files.lock();
        assert!(files.contains_key(&StoreKey::new("held")?));
        assert!(files.len() <= 2);
        drop(files);
        assert!(Arc::ptr_eq(&held, &store.get_file_mutex(&StoreKey::new("held")?)));
        Ok(())
    }
}

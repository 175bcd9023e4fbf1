//! An in-memory store.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::{
    byte_range::ByteRange,
    storage::{
        Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
        StoreKeys, StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
    },
};

/// An in-memory store.
///
/// Values are reference counted [`Bytes`], so whole-value reads do not copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.read().get(key).cloned())
    }

    fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError> {
        let Some(data) = self.data_map.read().get(key).cloned() else {
            return Ok(None);
        };
        let size = data.len() as u64;
        let mut out = Vec::with_capacity(byte_ranges.len());
        for byte_range in byte_ranges {
            let range = byte_range.resolve(size)?;
            #[allow(clippy::cast_possible_truncation)]
            out.push(data.slice(range.start as usize..range.end as usize));
        }
        Ok(Some(out))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.data_map.read().get(key).map(|data| data.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.data_map.write().insert(key.clone(), value);
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.write().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.data_map.write().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .read()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let data_map = self.data_map.read();
        let mut keys: StoreKeys = vec![];
        let mut prefixes: BTreeSet<StorePrefix> = BTreeSet::default();
        for key in data_map.keys().filter(|key| key.has_prefix(prefix)) {
            let remainder = &key.as_str()[prefix.as_str().len()..];
            match remainder.split_once('/') {
                Some((child, _)) => {
                    prefixes.insert(StorePrefix::new(format!("{}{child}/", prefix.as_str()))?);
                }
                None => keys.push(key.clone()),
            }
        }
        Ok(StoreKeysPrefixes::new(keys, prefixes.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_get_erase() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let key = StoreKey::new("a/b")?;
        assert!(store.get(&key)?.is_none());
        store.set(&key, Bytes::from_static(&[0, 1, 2, 3]))?;
        assert_eq!(store.get(&key)?.unwrap().as_ref(), &[0, 1, 2, 3]);
        assert_eq!(
            store.get_partial_values_key(&key, &[ByteRange::FromEnd(0, Some(2))])?,
            Some(vec![Bytes::from_static(&[2, 3])])
        );
        assert!(store
            .get_partial_values_key(&key, &[ByteRange::FromStart(0, Some(5))])
            .is_err());
        store.erase(&key)?;
        store.erase(&key)?;
        assert!(!store.exists(&key)?);
        Ok(())
    }

    #[test]
    fn memory_list() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&StoreKey::new("a/b")?, Bytes::new())?;
        store.set(&StoreKey::new("a/c/d")?, Bytes::new())?;
        store.set(&StoreKey::new("a/c/e")?, Bytes::new())?;
        store.set(&StoreKey::new("f")?, Bytes::new())?;

        let list_dir = store.list_dir(&StorePrefix::new("a/")?)?;
        assert_eq!(list_dir.keys(), &vec![StoreKey::new("a/b")?]);
        assert_eq!(list_dir.prefixes(), &vec![StorePrefix::new("a/c/")?]);
        assert_eq!(store.list_prefix(&StorePrefix::new("a/c/")?)?.len(), 2);

        store.erase_prefix(&StorePrefix::new("a/")?)?;
        assert_eq!(store.list_prefix(&StorePrefix::root())?, vec![StoreKey::new("f")?]);
        Ok(())
    }
}

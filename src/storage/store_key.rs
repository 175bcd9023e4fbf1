use derive_more::Display;
use thiserror::Error;

/// The key of a value in a store, e.g. `group/array/c/0/1`.
///
/// Keys are non-empty and have no leading or trailing `/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StoreKey(String);

/// A directory-like prefix of store keys, e.g. `group/array/`.
///
/// Prefixes end with `/` and have no leading `/`, except the root prefix which is empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StorePrefix(String);

/// A string that is not a valid [`StoreKey`] or [`StorePrefix`].
#[derive(Debug, Error)]
#[error("invalid store key or prefix {0}")]
pub struct StoreKeyError(String);

/// A list of [`StoreKey`].
pub type StoreKeys = Vec<StoreKey>;

/// A list of [`StorePrefix`].
pub type StorePrefixes = Vec<StorePrefix>;

fn checked(value: String, valid: bool) -> Result<String, StoreKeyError> {
    if valid {
        Ok(value)
    } else {
        Err(StoreKeyError(value))
    }
}

impl StoreKey {
    /// Create a store key.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if `key` is empty or starts or ends with `/`.
    pub fn new(key: impl Into<String>) -> Result<Self, StoreKeyError> {
        let key = key.into();
        let valid = !(key.is_empty() || key.starts_with('/') || key.ends_with('/'));
        checked(key, valid).map(Self)
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the key lies under `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl StorePrefix {
    /// Create a store prefix.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if `prefix` is not empty and starts with or does not end with `/`.
    pub fn new(prefix: impl Into<String>) -> Result<Self, StoreKeyError> {
        let prefix = prefix.into();
        let valid = prefix.is_empty() || (prefix.ends_with('/') && !prefix.starts_with('/'));
        checked(prefix, valid).map(Self)
    }

    /// The prefix of the whole store.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// The prefix as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key() {
        assert_eq!(StoreKey::new("a/c/0").unwrap().to_string(), "a/c/0");
        for invalid in ["", "a/", "/a"] {
            assert!(StoreKey::new(invalid).is_err(), "{invalid}");
        }
        assert_eq!(
            StoreKey::new("a/").unwrap_err().to_string(),
            "invalid store key or prefix a/"
        );
    }

    #[test]
    fn store_prefix() {
        assert!(StorePrefix::new("").is_ok());
        assert!(StorePrefix::new("a/b/").is_ok());
        assert!(StorePrefix::new("a").is_err());
        assert!(StorePrefix::new("/a/").is_err());
        let key = StoreKey::new("a/b/c").unwrap();
        assert!(key.has_prefix(&StorePrefix::new("a/").unwrap()));
        assert!(key.has_prefix(&StorePrefix::root()));
        assert!(!key.has_prefix(&StorePrefix::new("b/").unwrap()));
    }
}

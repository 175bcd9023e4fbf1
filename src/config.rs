//! Global configuration options.

use std::sync::OnceLock;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the `zarrs_engine` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Validate Checksums
///  > default: [`true`]
///
/// If enabled, checksum codecs (e.g. `crc32c`) will validate that encoded data matches stored checksums, otherwise validation is skipped.
///
/// ## Maximum Threads
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of workers used for [prefetching](crate::array::Array::advise_read) and chunk-aligned bulk writes.
/// The number of workers of an operation is additionally bounded by the number of chunks it touches.
/// Setting this to `1` runs these operations on the calling thread.
///
/// ## Chunk Presence Cache
/// > default: [`false`]
///
/// If enabled, arrays list their storage prefix when opened and remember which chunks exist, so that reads of absent chunks do not touch storage.
/// See [`Array::cache_chunk_presence`](crate::array::Array::cache_chunk_presence).
#[derive(Debug)]
pub struct Config {
    validate_checksums: bool,
    max_threads: usize,
    chunk_presence_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            validate_checksums: true,
            max_threads: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            chunk_presence_cache: false,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) {
        self.validate_checksums = validate_checksums;
    }

    /// Get the [maximum threads](#maximum-threads) configuration.
    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Set the [maximum threads](#maximum-threads) configuration.
    ///
    /// A value of zero is treated as one.
    pub fn set_max_threads(&mut self, max_threads: usize) {
        self.max_threads = max_threads.max(1);
    }

    /// Get the [chunk presence cache](#chunk-presence-cache) configuration.
    #[must_use]
    pub fn chunk_presence_cache(&self) -> bool {
        self.chunk_presence_cache
    }

    /// Set the [chunk presence cache](#chunk-presence-cache) configuration.
    pub fn set_chunk_presence_cache(&mut self, chunk_presence_cache: bool) {
        self.chunk_presence_cache = chunk_presence_cache;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// This might deadlock if the global config is already held mutably by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global configuration.
///
/// This might deadlock if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validate_checksums() {
        assert!(global_config().validate_checksums());
        global_config_mut().set_validate_checksums(false);
        assert!(!global_config().validate_checksums());
        global_config_mut().set_validate_checksums(true);
    }

    #[test]
    fn config_max_threads_at_least_one() {
        let mut config = Config::default();
        assert!(config.max_threads() >= 1);
        config.set_max_threads(0);
        assert_eq!(config.max_threads(), 1);
        config.set_max_threads(7);
        assert_eq!(config.max_threads(), 7);
    }
}

//! Compile time registries of named extensions.
//!
//! Codecs and chunk key encodings register a [`Plugin`] with [`inventory::submit!`].
//! Stored metadata is turned back into an implementation by looking up the first registered plugin that accepts the metadata name.

use thiserror::Error;

use crate::metadata::{ConfigurationInvalidError, Metadata};

/// A registered extension creating `T` from [`Metadata`].
pub struct Plugin<T> {
    identifier: &'static str,
    accepts: fn(name: &str) -> bool,
    create: fn(metadata: &Metadata) -> Result<T, PluginCreateError>,
}

/// Metadata could not be turned into a plugin implementation.
#[derive(Error, Debug)]
pub enum PluginCreateError {
    /// No registered plugin accepts the metadata name.
    #[error("{plugin_type} {name} is not supported")]
    Unsupported {
        /// The metadata name.
        name: String,
        /// The kind of plugin, e.g. `codec`.
        plugin_type: &'static str,
    },
    /// The plugin rejected the configuration.
    #[error(transparent)]
    ConfigurationInvalid(#[from] ConfigurationInvalidError),
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<String> for PluginCreateError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl<T> Plugin<T> {
    /// Create a plugin for registration.
    ///
    /// `accepts` decides if a metadata name belongs to the plugin, so aliases can share one implementation.
    pub const fn new(
        identifier: &'static str,
        accepts: fn(name: &str) -> bool,
        create: fn(metadata: &Metadata) -> Result<T, PluginCreateError>,
    ) -> Self {
        Self {
            identifier,
            accepts,
            create,
        }
    }

    /// The canonical name of the plugin.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.identifier
    }
}

/// Create a `T` from `metadata` with the first of `plugins` accepting its name.
///
/// # Errors
/// Returns [`PluginCreateError::Unsupported`] if no plugin accepts the name, or the error of the plugin.
pub(crate) fn create_from_registry<'a, T: 'a>(
    plugins: impl IntoIterator<Item = &'a Plugin<T>>,
    metadata: &Metadata,
    plugin_type: &'static str,
) -> Result<T, PluginCreateError> {
    let plugin = plugins
        .into_iter()
        .find(|plugin| (plugin.accepts)(metadata.name()))
        .ok_or_else(|| PluginCreateError::Unsupported {
            name: metadata.name().to_string(),
            plugin_type,
        })?;
    log::trace!("creating {plugin_type} {} from {metadata}", plugin.identifier());
    (plugin.create)(metadata)
}

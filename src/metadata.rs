//! Named extension metadata.
//!
//! Codecs, chunk key encodings and the chunk grid of an array are stored as a [`Metadata`] value.
//! A value without configuration is written as a bare JSON string.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// A name with an optional configuration object, e.g. `"crc32c"` or `{"name":"gzip","configuration":{"level":5}}`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(from = "MetadataJson", into = "MetadataJson")]
pub struct Metadata {
    name: String,
    configuration: Option<MetadataConfiguration>,
}

/// Configuration metadata.
pub type MetadataConfiguration = serde_json::Map<String, serde_json::Value>;

/// The stored forms of [`Metadata`].
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MetadataJson {
    Name(String),
    Configured(ConfiguredJson),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfiguredJson {
    name: String,
    #[serde(default)]
    configuration: Option<MetadataConfiguration>,
}

impl From<MetadataJson> for Metadata {
    fn from(json: MetadataJson) -> Self {
        match json {
            MetadataJson::Name(name) => Self {
                name,
                configuration: None,
            },
            MetadataJson::Configured(ConfiguredJson {
                name,
                configuration,
            }) => Self {
                name,
                configuration,
            },
        }
    }
}

impl From<Metadata> for MetadataJson {
    fn from(metadata: Metadata) -> Self {
        match metadata.configuration {
            None => Self::Name(metadata.name),
            configuration @ Some(_) => Self::Configured(ConfiguredJson {
                name: metadata.name,
                configuration,
            }),
        }
    }
}

impl TryFrom<&str> for Metadata {
    type Error = serde_json::Error;

    fn try_from(json: &str) -> Result<Self, Self::Error> {
        serde_json::from_str(json)
    }
}

impl core::fmt::Display for Metadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.configuration {
            Some(configuration) => write!(
                f,
                "{} {}",
                self.name,
                serde_json::Value::Object(configuration.clone())
            ),
            None => f.write_str(&self.name),
        }
    }
}

impl Metadata {
    /// Create metadata from `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            configuration: None,
        }
    }

    /// Create metadata from `name` and `configuration`.
    #[must_use]
    pub fn new_with_configuration(name: &str, configuration: MetadataConfiguration) -> Self {
        Self {
            name: name.into(),
            configuration: Some(configuration),
        }
    }

    /// Convert a serializable configuration to [`Metadata`].
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `configuration` does not serialize to a JSON object.
    pub fn new_with_serializable_configuration<TConfiguration: serde::Serialize>(
        name: &str,
        configuration: &TConfiguration,
    ) -> Result<Self, serde_json::Error> {
        let serde_json::Value::Object(configuration) = serde_json::to_value(configuration)? else {
            return Err(serde::ser::Error::custom(
                "the configuration is not a JSON object",
            ));
        };
        Ok(Self::new_with_configuration(name, configuration))
    }

    /// Try and convert [`Metadata`] to a deserializable configuration.
    ///
    /// A missing configuration is deserialized from an empty JSON object.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationInvalidError`] if the configuration cannot be converted.
    pub fn to_configuration<TConfiguration: DeserializeOwned>(
        &self,
    ) -> Result<TConfiguration, ConfigurationInvalidError> {
        let configuration = serde_json::Value::Object(self.configuration.clone().unwrap_or_default());
        serde_json::from_value(configuration)
            .map_err(|_| ConfigurationInvalidError::new(&self.name, self.configuration.clone()))
    }

    /// Returns the metadata name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the metadata configuration.
    #[must_use]
    pub const fn configuration(&self) -> Option<&MetadataConfiguration> {
        self.configuration.as_ref()
    }
}

/// A configuration that does not deserialize into the configuration of the named extension.
#[derive(Debug, Error)]
#[error("{name} is unsupported, configuration: {configuration:?}")]
pub struct ConfigurationInvalidError {
    name: String,
    configuration: Option<MetadataConfiguration>,
}

impl ConfigurationInvalidError {
    /// Create a new invalid configuration error.
    #[must_use]
    pub fn new(name: &str, configuration: Option<MetadataConfiguration>) -> Self {
        Self {
            name: name.to_string(),
            configuration,
        }
    }

    /// Return the name of the invalid configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, serde::Serialize, Debug, PartialEq)]
    struct LevelConfiguration {
        level: u32,
    }

    #[test]
    fn metadata_name_only() {
        let metadata: Metadata = r#""crc32c""#.try_into().unwrap();
        assert_eq!(metadata.name(), "crc32c");
        assert!(metadata.configuration().is_none());
        assert_eq!(serde_json::to_string(&metadata).unwrap(), r#""crc32c""#);
    }

    #[test]
    fn metadata_with_configuration() {
        let metadata: Metadata = r#"{"name":"gzip","configuration":{"level":5}}"#
            .try_into()
            .unwrap();
        assert_eq!(metadata.name(), "gzip");
        let configuration: LevelConfiguration = metadata.to_configuration().unwrap();
        assert_eq!(configuration, LevelConfiguration { level: 5 });
        let roundtrip =
            Metadata::new_with_serializable_configuration("gzip", &configuration).unwrap();
        assert_eq!(roundtrip, metadata);
    }

    #[test]
    fn metadata_invalid_configuration() {
        let metadata: Metadata = r#"{"name":"gzip","configuration":{"level":"high"}}"#
            .try_into()
            .unwrap();
        assert!(metadata.to_configuration::<LevelConfiguration>().is_err());
        assert!(Metadata::try_from(r#"{"name":"gzip","unknown":1}"#).is_err());
    }
}

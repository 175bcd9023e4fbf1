use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Zarr V3 group metadata, the `zarr.json` document of a group.
///
/// An example `JSON` document:
/// ```json
/// {
///     "zarr_format": 3,
///     "node_type": "group",
///     "attributes": {
///         "spam": "ham",
///         "eggs": 42
///     }
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadata {
    /// An integer defining the version of the storage specification to which the group adheres. Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// A string defining the type of hierarchy node element, must be `group` here.
    pub node_type: monostate::MustBe!("group"),
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl GroupMetadata {
    /// Create group metadata with `attributes`.
    #[must_use]
    pub fn new(attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("group"),
            attributes,
        }
    }
}

impl Default for GroupMetadata {
    fn default() -> Self {
        Self::new(serde_json::Map::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_metadata_node_type() {
        let metadata: GroupMetadata =
            serde_json::from_str(r#"{"zarr_format": 3, "node_type": "group"}"#).unwrap();
        assert!(metadata.attributes.is_empty());
        assert_eq!(
            metadata.to_string(),
            r#"{"zarr_format":3,"node_type":"group"}"#
        );
        assert!(
            serde_json::from_str::<GroupMetadata>(r#"{"zarr_format": 2, "node_type": "group"}"#)
                .is_err()
        );
        assert!(
            serde_json::from_str::<GroupMetadata>(r#"{"zarr_format": 3, "node_type": "array"}"#)
                .is_err()
        );
    }
}

//! The `multiscales` group attribute describing a pyramid of downsampled arrays.
//!
//! See <https://github.com/zarr-conventions/multiscales>.
//!
//! An example as written for a base array `data` with overviews in the child groups `ovr_2x` and `ovr_4x`:
//! ```json
//! {
//!     "layout": [
//!         { "asset": "data", "transform": { "scale": [1.0, 1.0] } },
//!         {
//!             "asset": "ovr_2x",
//!             "derived_from": "data",
//!             "transform": { "scale": [2.0, 2.0], "translation": [0.0, 0.0] },
//!             "resampling_method": "NEAREST"
//!         },
//!         {
//!             "asset": "ovr_4x",
//!             "derived_from": "ovr_2x",
//!             "transform": { "scale": [2.0, 2.0], "translation": [0.0, 0.0] },
//!             "resampling_method": "NEAREST"
//!         }
//!     ]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// The name of the group attribute holding [`MultiscalesMetadata`].
pub const MULTISCALES_ATTRIBUTE: &str = "multiscales";

/// The name of the group attribute listing the conventions the group follows.
pub const ZARR_CONVENTIONS_ATTRIBUTE: &str = "zarr_conventions";

/// The `multiscales` attribute.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MultiscalesMetadata {
    /// The levels, the full resolution level first.
    pub layout: Vec<MultiscalesLevel>,
}

/// A level of a [`MultiscalesMetadata`] layout.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MultiscalesLevel {
    /// The level, relative to the group holding the attribute.
    ///
    /// Either a group holding an array of the same name as the base, the name of an array in the group, or a `<group>/<array>` path.
    pub asset: String,
    /// The asset this level was resampled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    /// The transform from this level to the level it was derived from.
    pub transform: MultiscalesTransform,
    /// The resampling method used to derive this level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resampling_method: Option<String>,
}

/// The transform of a [`MultiscalesLevel`].
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MultiscalesTransform {
    /// The scale per dimension.
    pub scale: Vec<f64>,
    /// The translation per dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<Vec<f64>>,
}

/// The `zarr_conventions` entry declaring the multiscales convention.
#[must_use]
pub fn multiscales_convention() -> serde_json::Value {
    serde_json::json!({
        "name": MULTISCALES_ATTRIBUTE,
        "schema_url": "https://raw.githubusercontent.com/zarr-conventions/multiscales/refs/tags/v1/schema.json",
        "spec_url": "https://github.com/zarr-conventions/multiscales/blob/v1/README.md",
        "description": "Multiscale layout of zarr datasets",
    })
}

/// Returns true if the `zarr_conventions` entry `convention` is the multiscales convention.
#[must_use]
pub fn is_multiscales_convention(convention: &serde_json::Value) -> bool {
    convention.get("name").and_then(serde_json::Value::as_str) == Some(MULTISCALES_ATTRIBUTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiscales_metadata() {
        let json = r#"{
            "layout": [
                {"asset": "data", "transform": {"scale": [1.0, 1.0]}},
                {
                    "asset": "ovr_2x",
                    "derived_from": "data",
                    "transform": {"scale": [2.0, 2.0], "translation": [0.0, 0.0]},
                    "resampling_method": "AVERAGE"
                }
            ]
        }"#;
        let metadata: MultiscalesMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.layout.len(), 2);
        assert_eq!(metadata.layout[0].derived_from, None);
        assert_eq!(metadata.layout[1].derived_from.as_deref(), Some("data"));
        assert_eq!(
            metadata.layout[1].resampling_method.as_deref(),
            Some("AVERAGE")
        );
        let value = serde_json::to_value(&metadata).unwrap();
        assert!(value["layout"][0].get("translation").is_none());
        assert!(value["layout"][0]["transform"].get("translation").is_none());
    }

    #[test]
    fn multiscales_convention_name() {
        assert!(is_multiscales_convention(&multiscales_convention()));
        assert!(!is_multiscales_convention(
            &serde_json::json!({"name": "spatial"})
        ));
    }
}

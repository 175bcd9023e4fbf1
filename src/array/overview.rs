//! Overviews: downsampled copies of an array forming a pyramid.
//!
//! [`Array::build_overviews`] writes one overview per downsampling factor into a sibling group `ovr_<factor>x` holding an array of the same name.
//! Each overview is resampled from the previous (larger) one along the two spatial dimensions, and the parent group is given a [`multiscales`](crate::group::multiscales) attribute describing the pyramid.
//!
//! [`Array::overview_count`] and [`Array::overview`] discover the overviews of an array from the `multiscales` attribute of its parent group, or its grandparent group for an array inside an overview group.

mod resample;

use thiserror::Error;

pub use self::resample::Resampling;
use self::resample::{resample, source_rows, RasterWindow};

use crate::{
    array_subset::ArraySubset,
    group::{Group, GroupCreateError},
    metadata::{ConfigurationInvalidError, Metadata},
    node::{NodeMetadata, NodePath, NodePathError},
    plugin::PluginCreateError,
    storage::{ReadableWritableListableStorageTraits, StorageError},
};

use super::{
    codec::{array_to_bytes::sharding, ShardingCodecConfiguration},
    unravel_index, Array, ArrayBuilder, ArrayCreateError, ArrayError, ArrayShape, ChunkShape,
    CodecChain, DataType, FillValue,
};

/// The name prefix of overview groups.
const OVERVIEW_GROUP_PREFIX: &str = "ovr_";

/// The attribute of a coordinate array identifying its axis (`"X"` or `"Y"`).
const AXIS_ATTRIBUTE: &str = "axis";

/// An overview error.
#[derive(Debug, Error)]
pub enum OverviewError {
    /// The array has fewer than two dimensions.
    #[error("overviews require at least two dimensions, the array has {_0}")]
    TooFewDimensions(usize),
    /// The array is read only.
    #[error("array is read only")]
    ReadOnly,
    /// The array is the root node.
    #[error("overviews require an array with a parent group")]
    NoParentGroup,
    /// Distinct spatial dimensions cannot be identified.
    #[error("distinct X and Y dimensions cannot be identified")]
    NoSpatialDimensions,
    /// A downsampling factor is less than two.
    #[error("invalid overview factor {_0}, factors must be at least 2")]
    InvalidFactor(u64),
    /// An unsupported resampling method.
    #[error("unsupported resampling method {_0}")]
    UnsupportedResampling(String),
    /// An array error.
    #[error(transparent)]
    ArrayError(#[from] ArrayError),
    /// An array creation error.
    #[error(transparent)]
    ArrayCreateError(#[from] ArrayCreateError),
    /// A group error.
    #[error(transparent)]
    GroupCreateError(#[from] GroupCreateError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// An invalid sharding configuration.
    #[error(transparent)]
    ConfigurationInvalidError(#[from] ConfigurationInvalidError),
    /// Error creating the codecs of an overview.
    #[error(transparent)]
    CodecsCreateError(PluginCreateError),
}

/// The role of a dimension in a raster.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn from_dimension_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x" | "lon" | "longitude" => Some(Self::X),
            "y" | "lat" | "latitude" => Some(Self::Y),
            _ => None,
        }
    }

    fn from_attribute(axis: &str) -> Option<Self> {
        match axis {
            "X" => Some(Self::X),
            "Y" => Some(Self::Y),
            _ => None,
        }
    }
}

/// The spatial dimensions of an array.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SpatialDimensions {
    y: usize,
    x: usize,
}

/// The coordinates of a dimension.
#[derive(Debug, PartialEq)]
enum Coordinates {
    /// Evenly spaced coordinates `start + i * increment`.
    Regular { start: f64, increment: f64 },
    Irregular(Vec<f64>),
}

impl Coordinates {
    fn new(values: Vec<f64>) -> Self {
        if values.len() >= 2 {
            let increment = values[1] - values[0];
            let tolerance = 1e-9 * increment.abs().max(f64::MIN_POSITIVE);
            let regular = values
                .windows(2)
                .all(|pair| ((pair[1] - pair[0]) - increment).abs() <= tolerance);
            if regular {
                return Self::Regular {
                    start: values[0],
                    increment,
                };
            }
        }
        Self::Irregular(values)
    }

    /// The coordinates of a dimension of `size` downsampled by `factor`.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn downsample(&self, size: u64, factor: u64) -> Vec<f64> {
        let size_out = size.div_ceil(factor);
        match self {
            Self::Regular { start, increment } => (0..size_out)
                .map(|j| start + ((j * factor) as f64 + (factor - 1) as f64 / 2.0) * increment)
                .collect(),
            Self::Irregular(values) => (0..size_out)
                .map(|j| {
                    let index = (j * factor + factor / 2).min(values.len() as u64 - 1);
                    values[index as usize]
                })
                .collect(),
        }
    }
}

impl<TStorage: ?Sized + ReadableWritableListableStorageTraits> Array<TStorage> {
    /// Return the number of overviews of the array.
    ///
    /// Overviews are discovered on first use and cached until [`build_overviews`](Array::build_overviews) is called.
    #[must_use]
    pub fn overview_count(&self) -> usize {
        self.overview_paths().len()
    }

    /// Open overview `index` of the array, [`None`] if `index` is out of bounds.
    ///
    /// Overviews are ordered as they appear in the `multiscales` layout, typically largest first.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if the overview cannot be opened.
    pub fn overview(&self, index: usize) -> Result<Option<Self>, ArrayCreateError> {
        match self.overview_paths().get(index) {
            Some(path) => Ok(Some(Self::open(self.storage.clone(), path.as_str())?)),
            None => Ok(None),
        }
    }

    fn overview_paths(&self) -> Vec<NodePath> {
        let mut overviews = self.overviews.lock();
        if let Some(paths) = overviews.as_ref() {
            return paths.clone();
        }
        let paths = self.discover_overviews().unwrap_or_else(|err| {
            log::warn!("failed to discover overviews of array {}: {err}", self.path);
            Vec::new()
        });
        *overviews = Some(paths.clone());
        paths
    }

    fn discover_overviews(&self) -> Result<Vec<NodePath>, OverviewError> {
        let Some(parent) = self.path.parent() else {
            return Ok(Vec::new());
        };
        let groups = std::iter::once(parent.clone()).chain(parent.parent());
        for group_path in groups {
            let group = Group::open(self.storage.clone(), group_path.as_str())?;
            let Some(multiscales) = group.multiscales() else {
                continue;
            };
            let Some(base) = multiscales.layout.first() else {
                continue;
            };
            let base_matches = self
                .resolve_asset(&group_path, &base.asset)?
                .is_some_and(|base| base.name() == self.path.name());
            if !base_matches {
                continue;
            }

            let num_elements: u64 = self.shape.iter().product();
            let data_type = self.data_type.metadata();
            let mut paths = Vec::new();
            for level in &multiscales.layout {
                let Some(path) = self.resolve_asset(&group_path, &level.asset)? else {
                    log::warn!(
                        "skipping unknown overview asset {} of group {group_path}",
                        level.asset
                    );
                    continue;
                };
                if path == self.path {
                    continue;
                }
                let Some(NodeMetadata::Array(metadata)) =
                    NodeMetadata::read(&*self.storage, &path)?
                else {
                    continue;
                };
                if metadata.shape.len() == self.dimensionality()
                    && metadata.data_type == data_type
                    && metadata.shape.iter().product::<u64>() < num_elements
                {
                    paths.push(path);
                }
            }
            log::debug!("array {} has {} overviews", self.path, paths.len());
            return Ok(paths);
        }
        Ok(Vec::new())
    }

    /// Resolve a `multiscales` asset of the group at `group_path` to the path of an array.
    fn resolve_asset(
        &self,
        group_path: &NodePath,
        asset: &str,
    ) -> Result<Option<NodePath>, OverviewError> {
        let path = group_path.join(asset)?;
        match NodeMetadata::read(&*self.storage, &path)? {
            Some(NodeMetadata::Array(_)) => Ok(Some(path)),
            Some(NodeMetadata::Group(_)) => {
                let path = path.child(self.path.name())?;
                match NodeMetadata::read(&*self.storage, &path)? {
                    Some(NodeMetadata::Array(_)) => Ok(Some(path)),
                    _ => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// The coordinate array of dimension `dimension` in the group at `group_path`, if it exists.
    fn coordinate_array_path(&self, group_path: &NodePath, dimension: usize) -> Option<NodePath> {
        let name = self.dimension_names.as_ref()?.get(dimension)?.as_ref()?;
        group_path.child(name).ok()
    }

    fn spatial_dimensions(&self, parent: &NodePath) -> Result<SpatialDimensions, OverviewError> {
        let dimensionality = self.dimensionality();
        let (mut x, mut y) = (None, None);
        for dimension in 0..dimensionality {
            let Some(Some(name)) = self
                .dimension_names
                .as_ref()
                .and_then(|names| names.get(dimension))
            else {
                continue;
            };
            let axis_attribute = match self.coordinate_array_path(parent, dimension) {
                Some(path) => match NodeMetadata::read(&*self.storage, &path)? {
                    Some(NodeMetadata::Array(metadata)) if metadata.shape.len() == 1 => metadata
                        .attributes
                        .get(AXIS_ATTRIBUTE)
                        .and_then(serde_json::Value::as_str)
                        .and_then(Axis::from_attribute),
                    _ => None,
                },
                None => None,
            };
            match axis_attribute.or_else(|| Axis::from_dimension_name(name)) {
                Some(Axis::X) if x.is_none() => x = Some(dimension),
                Some(Axis::Y) if y.is_none() => y = Some(dimension),
                _ => {}
            }
        }
        let spatial = SpatialDimensions {
            y: y.unwrap_or(dimensionality - 2),
            x: x.unwrap_or(dimensionality - 1),
        };
        if spatial.x == spatial.y {
            return Err(OverviewError::NoSpatialDimensions);
        }
        Ok(spatial)
    }

    /// The codecs of an overview with `chunk_shape`.
    ///
    /// Sharding is dropped if the inner chunk shape does not divide the chunk shape.
    fn overview_codecs(&self, chunk_shape: &ChunkShape) -> Result<CodecChain, OverviewError> {
        let divides = std::iter::zip(chunk_shape.iter(), self.inner_chunk_shape.iter())
            .all(|(outer, inner)| outer.get() % inner.get() == 0);
        if !self.is_sharded() || divides {
            return Ok(self.codecs.clone());
        }
        let mut metadatas = self.codecs.create_metadatas().into_iter();
        let Some(sharding) = metadatas.next().filter(|metadata| metadata.name() == sharding::IDENTIFIER)
        else {
            return Ok(self.codecs.clone());
        };
        let configuration: ShardingCodecConfiguration = sharding.to_configuration()?;
        log::debug!(
            "dropping sharding for overview chunk shape {:?} of array {}",
            chunk_shape.to_array_shape(),
            self.path
        );
        let codecs: Vec<Metadata> = configuration.codecs.into_iter().chain(metadatas).collect();
        CodecChain::from_metadata(&codecs).map_err(OverviewError::CodecsCreateError)
    }

    /// Create the (empty) overview of the array at `path` for `factor`.
    fn create_overview(
        &self,
        path: &NodePath,
        spatial: SpatialDimensions,
        factor: u64,
    ) -> Result<Self, OverviewError> {
        let shape: ArrayShape = self
            .shape
            .iter()
            .enumerate()
            .map(|(dimension, &size)| {
                if dimension == spatial.x || dimension == spatial.y {
                    size.div_ceil(factor)
                } else {
                    size
                }
            })
            .collect();
        let chunk_shape: Vec<u64> = std::iter::zip(self.chunk_shape.iter(), &shape)
            .map(|(chunk, &size)| chunk.get().min(size).max(1))
            .collect();
        let chunk_shape = ChunkShape::try_from(chunk_shape.clone())
            .map_err(|_| ArrayCreateError::ZeroChunkDimension(chunk_shape))?;
        let codecs = self.overview_codecs(&chunk_shape)?;
        let mut overview = Self::new_with_parts(
            self.storage.clone(),
            path.as_str(),
            shape,
            self.data_type.clone(),
            chunk_shape,
            self.chunk_key_encoding.clone(),
            self.fill_value.clone(),
            codecs,
        )?;
        overview.set_attributes(self.attributes.clone());
        overview.set_dimension_names(self.dimension_names.clone())?;
        overview.store_metadata()?;
        Ok(overview)
    }

    /// Write the coordinate arrays of the spatial dimensions of the overview in `group_path` for `factor`.
    fn store_overview_coordinates(
        &self,
        parent: &NodePath,
        group_path: &NodePath,
        spatial: SpatialDimensions,
        factor: u64,
    ) -> Result<(), OverviewError> {
        for dimension in [spatial.y, spatial.x] {
            let Some(source_path) = self.coordinate_array_path(parent, dimension) else {
                continue;
            };
            let size = self.shape[dimension];
            let source = match NodeMetadata::read(&*self.storage, &source_path)? {
                Some(NodeMetadata::Array(metadata)) if metadata.shape == [size] => {
                    Self::open(self.storage.clone(), source_path.as_str())?
                }
                _ => continue,
            };
            let values = source
                .retrieve_array_subset_elements::<f64>(&ArraySubset::new_with_shape(vec![size]))?;
            let values = Coordinates::new(values).downsample(size, factor);
            let size_out = values.len() as u64;
            let mut coordinates = ArrayBuilder::new(
                vec![size_out],
                DataType::Float64,
                vec![size_out],
                FillValue::from(f64::NAN),
            )
            .attributes(source.attributes().clone())
            .dimension_names(source.dimension_names().cloned())
            .build(self.storage.clone(), group_path.child(source_path.name())?.as_str())?;
            coordinates.store_metadata()?;
            coordinates
                .store_array_subset_elements(&ArraySubset::new_with_shape(vec![size_out]), &values)?;
            coordinates.flush()?;
        }
        Ok(())
    }

    /// Build overviews of the array, one per factor in `factors`, replacing any existing overviews.
    ///
    /// Overviews are written to sibling groups `ovr_<factor>x` holding an array with the same name, and the parent group is given a `multiscales` attribute.
    /// Each spatial dimension of an overview is `ceil(size / factor)`, other dimensions are preserved.
    /// The spatial dimensions are identified by the `axis` attribute of the coordinate array named after each dimension in the parent group, then by dimension name (`x`, `lon` and `longitude`, or `y`, `lat` and `latitude`), and otherwise are the last two dimensions.
    ///
    /// `resampling` is `NEAREST` (the default if empty) or `AVERAGE` (case insensitive).
    /// An empty `factors` removes all overviews.
    /// `progress` is called with the fraction of overview elements written.
    ///
    /// # Errors
    /// Returns an [`OverviewError`] if
    ///  - the array has fewer than two dimensions, is read only, or is the root node,
    ///  - the spatial dimensions are not distinct,
    ///  - a factor is less than 2 or the resampling method is unsupported, or
    ///  - there is an underlying array, group or storage error.
    pub fn build_overviews(
        &mut self,
        resampling: &str,
        factors: &[u64],
        progress: &mut dyn FnMut(f64),
    ) -> Result<(), OverviewError> {
        if self.dimensionality() < 2 {
            return Err(OverviewError::TooFewDimensions(self.dimensionality()));
        }
        if self.storage.readonly() {
            return Err(OverviewError::ReadOnly);
        }
        let parent = self.path.parent().ok_or(OverviewError::NoParentGroup)?;
        let spatial = self.spatial_dimensions(&parent)?;
        let resampling: Resampling = resampling.parse()?;
        let mut factors = factors.to_vec();
        factors.sort_unstable();
        factors.dedup();
        if let Some(&factor) = factors.iter().find(|&&factor| factor < 2) {
            return Err(OverviewError::InvalidFactor(factor));
        }

        self.flush()?;
        let mut group = Group::open(self.storage.clone(), parent.as_str())?;
        for name in group.group_names()? {
            if name.starts_with(OVERVIEW_GROUP_PREFIX) {
                group.delete_group(&name)?;
            }
        }
        if factors.is_empty() {
            group.generate_multiscales_metadata(None)?;
            *self.overviews.lock() = None;
            return Ok(());
        }

        let level_elements = |factor: u64| -> u64 {
            self.shape
                .iter()
                .enumerate()
                .map(|(dimension, &size)| {
                    if dimension == spatial.x || dimension == spatial.y {
                        size.div_ceil(factor)
                    } else {
                        size
                    }
                })
                .product()
        };
        #[allow(clippy::cast_precision_loss)]
        let total = factors.iter().map(|&factor| level_elements(factor)).sum::<u64>() as f64;
        let mut done = 0;
        progress(0.0);

        let mut previous: Option<Self> = None;
        for &factor in &factors {
            let group_path = parent.child(&format!("{OVERVIEW_GROUP_PREFIX}{factor}x"))?;
            Group::create(self.storage.clone(), group_path.as_str())?;
            let path = group_path.child(self.path.name())?;
            log::debug!("building overview {path} of array {} with factor {factor}", self.path);
            let mut overview = self.create_overview(&path, spatial, factor)?;
            self.store_overview_coordinates(&parent, &group_path, spatial, factor)?;

            let source = previous.as_ref().unwrap_or(&*self);
            source.resample_into(&mut overview, spatial, resampling, &mut |elements| {
                done += elements;
                #[allow(clippy::cast_precision_loss)]
                progress(done as f64 / total);
            })?;
            overview.flush()?;
            previous = Some(overview);
        }

        group.generate_multiscales_metadata(Some(resampling.name()))?;
        *self.overviews.lock() = None;
        progress(1.0);
        Ok(())
    }

    /// Resample the array into `destination` band by band, in strips of destination rows.
    ///
    /// `progress` is called with the number of destination elements written by each strip.
    fn resample_into(
        &self,
        destination: &mut Self,
        spatial: SpatialDimensions,
        resampling: Resampling,
        progress: &mut dyn FnMut(u64),
    ) -> Result<(), OverviewError> {
        let SpatialDimensions { y, x } = spatial;
        let source_shape = (self.shape[y], self.shape[x]);
        let destination_shape = (destination.shape[y], destination.shape[x]);
        let row_major = y < x;
        let band_dimensions: Vec<usize> = (0..self.dimensionality())
            .filter(|&dimension| dimension != x && dimension != y)
            .collect();
        let band_shape: Vec<u64> = band_dimensions
            .iter()
            .map(|&dimension| self.shape[dimension])
            .collect();
        let num_bands: u64 = band_shape.iter().product();
        let strip_rows = destination.inner_chunk_shape[y].get();
        let size = self.data_type.size();

        let subset = |band: &[u64], rows: std::ops::Range<u64>, columns: u64| {
            let mut ranges = vec![0..0; self.dimensionality()];
            ranges[y] = rows;
            ranges[x] = 0..columns;
            for (&dimension, &index) in std::iter::zip(&band_dimensions, band) {
                ranges[dimension] = index..index + 1;
            }
            ArraySubset::new_with_ranges(&ranges)
        };

        for band in 0..num_bands {
            let band = unravel_index(band, &band_shape);
            let mut row_start = 0;
            while row_start < destination_shape.0 {
                let rows = row_start..(row_start + strip_rows).min(destination_shape.0);
                let source_range =
                    source_rows(resampling, rows.clone(), source_shape.0, destination_shape.0);
                let source = RasterWindow {
                    bytes: self.retrieve_array_subset(&subset(&band, source_range.clone(), source_shape.1))?,
                    row_start: source_range.start,
                    rows: source_range.end - source_range.start,
                    columns: source_shape.1,
                    row_major,
                };
                let num_rows = rows.end - rows.start;
                #[allow(clippy::cast_possible_truncation)]
                let mut window = RasterWindow {
                    bytes: vec![0; (num_rows * destination_shape.1) as usize * size],
                    row_start,
                    rows: num_rows,
                    columns: destination_shape.1,
                    row_major,
                };
                resample(
                    resampling,
                    &self.data_type,
                    self.fill_value.as_ref(),
                    &source,
                    source_shape,
                    &mut window,
                    destination_shape,
                )?;
                destination.store_array_subset(&subset(&band, rows, destination_shape.1), &window.bytes)?;
                progress(num_rows * destination_shape.1);
                row_start += strip_rows;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::storage::store::MemoryStore;

    use super::*;

    #[test]
    fn coordinates_downsample() {
        let regular = Coordinates::new(vec![10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(
            regular,
            Coordinates::Regular {
                start: 10.0,
                increment: 1.0
            }
        );
        assert_eq!(regular.downsample(5, 2), vec![10.5, 12.5, 14.5]);

        let irregular = Coordinates::new(vec![0.0, 1.0, 3.0, 7.0, 15.0]);
        assert!(matches!(irregular, Coordinates::Irregular(_)));
        assert_eq!(irregular.downsample(5, 2), vec![1.0, 7.0, 15.0]);
    }

    fn create_array(
        store: &Arc<MemoryStore>,
        path: &str,
        shape: Vec<u64>,
        dimension_names: Option<Vec<Option<String>>>,
    ) -> Array<MemoryStore> {
        let chunk_shape = shape.iter().map(|&size| size.min(16)).collect();
        let mut array = ArrayBuilder::new(shape, DataType::UInt16, chunk_shape, FillValue::from(0u16))
            .dimension_names(dimension_names)
            .build(store.clone(), path)
            .unwrap();
        array.store_metadata().unwrap();
        array
    }

    #[test]
    fn overview_validation() {
        let store = Arc::new(MemoryStore::new());
        let mut array = create_array(&store, "/group/vector", vec![10], None);
        assert!(matches!(
            array.build_overviews("", &[2], &mut |_| {}),
            Err(OverviewError::TooFewDimensions(1))
        ));

        let mut array = create_array(&store, "/group/data", vec![10, 10], None);
        assert!(matches!(
            array.build_overviews("", &[2, 1], &mut |_| {}),
            Err(OverviewError::InvalidFactor(1))
        ));
        assert!(matches!(
            array.build_overviews("bilinear", &[2], &mut |_| {}),
            Err(OverviewError::UnsupportedResampling(_))
        ));

        let mut root = create_array(&store, "/", vec![10, 10], None);
        assert!(matches!(
            root.build_overviews("", &[2], &mut |_| {}),
            Err(OverviewError::NoParentGroup)
        ));
    }

    #[test]
    fn overview_spatial_dimensions() {
        let store = Arc::new(MemoryStore::new());
        let names = |names: &[&str]| Some(names.iter().map(|name| Some(name.to_string())).collect());

        let array = create_array(&store, "/a/data", vec![3, 10, 20], names(&["band", "lat", "lon"]));
        assert_eq!(
            array.spatial_dimensions(&NodePath::new("/a").unwrap()).unwrap(),
            SpatialDimensions { y: 1, x: 2 }
        );

        let array = create_array(&store, "/b/data", vec![20, 10, 3], names(&["easting", "northing", "band"]));
        let mut coordinate = create_array(&store, "/b/easting", vec![20], None);
        coordinate.set_attributes(serde_json::json!({"axis": "X"}).as_object().unwrap().clone());
        coordinate.store_metadata().unwrap();
        let mut coordinate = create_array(&store, "/b/northing", vec![10], None);
        coordinate.set_attributes(serde_json::json!({"axis": "Y"}).as_object().unwrap().clone());
        coordinate.store_metadata().unwrap();
        assert_eq!(
            array.spatial_dimensions(&NodePath::new("/b").unwrap()).unwrap(),
            SpatialDimensions { y: 1, x: 0 }
        );

        let array = create_array(&store, "/c/data", vec![10, 10, 10], names(&["x", "time", "longitude"]));
        assert_eq!(
            array.spatial_dimensions(&NodePath::new("/c").unwrap()).unwrap(),
            SpatialDimensions { y: 1, x: 0 }
        );

        let array = create_array(&store, "/d/data", vec![10, 10], names(&["x", "t"]));
        assert!(matches!(
            array.spatial_dimensions(&NodePath::new("/d").unwrap()),
            Err(OverviewError::NoSpatialDimensions)
        ));
    }

    #[test]
    fn overview_bands_and_coordinates() {
        let store = Arc::new(MemoryStore::new());
        let names = Some(vec![Some("band".to_string()), Some("y".to_string()), Some("x".to_string())]);
        let mut array = create_array(&store, "/group/data", vec![2, 6, 5], names);
        let elements: Vec<u16> = (0..60).collect();
        array
            .store_array_subset_elements(&ArraySubset::new_with_shape(vec![2, 6, 5]), &elements)
            .unwrap();
        let mut x = ArrayBuilder::new(vec![5], DataType::Float64, vec![5], FillValue::from(f64::NAN))
            .attributes(serde_json::json!({"units": "m"}).as_object().unwrap().clone())
            .build(store.clone(), "/group/x")
            .unwrap();
        x.store_metadata().unwrap();
        x.store_array_subset_elements(&ArraySubset::new_with_shape(vec![5]), &[0.0, 10.0, 20.0, 30.0, 40.0])
            .unwrap();
        x.flush().unwrap();

        let mut fractions = Vec::new();
        array
            .build_overviews("nearest", &[2], &mut |fraction| fractions.push(fraction))
            .unwrap();
        assert_eq!(fractions.first(), Some(&0.0));
        assert_eq!(fractions.last(), Some(&1.0));
        assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));

        assert_eq!(array.overview_count(), 1);
        let overview = array.overview(0).unwrap().unwrap();
        assert_eq!(overview.path().as_str(), "/group/ovr_2x/data");
        assert_eq!(overview.shape(), &[2, 3, 3]);
        let elements = overview
            .retrieve_array_subset_elements::<u16>(&ArraySubset::new_with_shape(vec![2, 3, 3]))
            .unwrap();
        #[rustfmt::skip]
        assert_eq!(elements, vec![
            5, 7, 9, 15, 17, 19, 25, 27, 29,
            35, 37, 39, 45, 47, 49, 55, 57, 59,
        ]);
        assert!(array.overview(1).unwrap().is_none());

        let x = Array::open(store.clone(), "/group/ovr_2x/x").unwrap();
        assert_eq!(x.attributes()["units"], "m");
        let x = x
            .retrieve_array_subset_elements::<f64>(&ArraySubset::new_with_shape(vec![3]))
            .unwrap();
        assert_eq!(x, vec![5.0, 25.0, 45.0]);
        assert!(NodeMetadata::read(&*store, &NodePath::new("/group/ovr_2x/y").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn overview_drops_sharding() {
        let store = Arc::new(MemoryStore::new());
        let mut array = ArrayBuilder::new(vec![16, 16], DataType::UInt8, vec![8, 8], FillValue::from(0u8))
            .sharding(Some(vec![4, 4]))
            .build(store.clone(), "/group/data")
            .unwrap();
        array.store_metadata().unwrap();
        array
            .store_array_subset(&ArraySubset::new_with_shape(vec![16, 16]), &[7; 256])
            .unwrap();

        array.build_overviews("average", &[2, 4, 8], &mut |_| {}).unwrap();
        assert_eq!(array.overview_count(), 3);
        let overview = array.overview(0).unwrap().unwrap();
        assert!(overview.is_sharded());
        let overview = array.overview(1).unwrap().unwrap();
        assert_eq!(overview.chunk_shape().to_array_shape(), vec![4, 4]);
        assert_eq!(overview.metadata().codecs[0].name(), sharding::IDENTIFIER);
        let overview = array.overview(2).unwrap().unwrap();
        assert_eq!(overview.shape(), &[2, 2]);
        assert_eq!(overview.metadata().codecs[0].name(), "bytes");
        assert_eq!(
            overview
                .retrieve_array_subset(&ArraySubset::new_with_shape(vec![2, 2]))
                .unwrap(),
            vec![7; 4]
        );
    }
}

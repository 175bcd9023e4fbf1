//! Band-wise resampling of raster windows.

use std::str::FromStr;

use crate::array::{
    element::{array_bytes_to_elements, elements_to_array_bytes},
    ArrayError, DataType, FillValue,
};

use super::OverviewError;

/// A resampling method.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Resampling {
    /// The source element nearest to the centre of the destination element.
    #[default]
    Nearest,
    /// The mean of the source elements covered by the destination element, ignoring the fill value and NaN.
    ///
    /// Only supported for real numeric data types.
    Average,
}

impl Resampling {
    /// The name of the method, as recorded in `multiscales` metadata.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "NEAREST",
            Self::Average => "AVERAGE",
        }
    }
}

impl FromStr for Resampling {
    type Err = OverviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("nearest") {
            Ok(Self::Nearest)
        } else if s.eq_ignore_ascii_case("average") {
            Ok(Self::Average)
        } else {
            Err(OverviewError::UnsupportedResampling(s.to_string()))
        }
    }
}

/// A window of rows of one band of a raster, holding native element bytes.
///
/// Rows run along the Y dimension and columns along the X dimension of the array.
/// If the X dimension precedes the Y dimension in the array, the bytes are column major.
#[derive(Debug)]
pub(crate) struct RasterWindow {
    pub(crate) bytes: Vec<u8>,
    /// The first row of the window in the band.
    pub(crate) row_start: u64,
    pub(crate) rows: u64,
    pub(crate) columns: u64,
    pub(crate) row_major: bool,
}

impl RasterWindow {
    /// The element index of (`row`, `column`) of the band.
    #[allow(clippy::cast_possible_truncation)]
    fn index(&self, row: u64, column: u64) -> usize {
        let row = row - self.row_start;
        if self.row_major {
            (row * self.columns + column) as usize
        } else {
            (column * self.rows + row) as usize
        }
    }
}

/// The range of source indices covered by destination index `index`, given the source and destination sizes.
fn source_window(index: u64, source_size: u64, destination_size: u64) -> std::ops::Range<u64> {
    let start = index * source_size / destination_size;
    let end = ((index + 1) * source_size)
        .div_ceil(destination_size)
        .clamp(start + 1, source_size);
    start..end
}

/// The source index nearest to the centre of destination index `index`.
fn source_nearest(index: u64, source_size: u64, destination_size: u64) -> u64 {
    ((2 * index + 1) * source_size / (2 * destination_size)).min(source_size - 1)
}

/// The source rows needed to resample destination rows `rows`.
pub(crate) fn source_rows(
    resampling: Resampling,
    rows: std::ops::Range<u64>,
    source_size: u64,
    destination_size: u64,
) -> std::ops::Range<u64> {
    match resampling {
        Resampling::Nearest => {
            source_nearest(rows.start, source_size, destination_size)
                ..source_nearest(rows.end - 1, source_size, destination_size) + 1
        }
        Resampling::Average => {
            source_window(rows.start, source_size, destination_size).start
                ..source_window(rows.end - 1, source_size, destination_size).end
        }
    }
}

/// Resample `source` into `destination`.
///
/// `source_shape` and `destination_shape` are the (rows, columns) of the whole bands.
/// `source` must hold the rows given by [`source_rows`] for the rows of `destination`.
///
/// # Errors
/// Returns an [`ArrayError`] if averaging a data type that is not a real number.
pub(crate) fn resample(
    resampling: Resampling,
    data_type: &DataType,
    fill_value: Option<&FillValue>,
    source: &RasterWindow,
    source_shape: (u64, u64),
    destination: &mut RasterWindow,
    destination_shape: (u64, u64),
) -> Result<(), ArrayError> {
    let (source_rows, source_columns) = source_shape;
    let (destination_rows, destination_columns) = destination_shape;
    let rows = destination.row_start..destination.row_start + destination.rows;
    match resampling {
        Resampling::Nearest => {
            let size = data_type.size();
            for row in rows {
                let source_row = source_nearest(row, source_rows, destination_rows);
                for column in 0..destination_columns {
                    let source_column = source_nearest(column, source_columns, destination_columns);
                    let src = source.index(source_row, source_column) * size;
                    let dst = destination.index(row, column) * size;
                    destination.bytes[dst..dst + size]
                        .copy_from_slice(&source.bytes[src..src + size]);
                }
            }
        }
        Resampling::Average => {
            let values = array_bytes_to_elements::<f64>(&source.bytes, data_type)?;
            let nodata = fill_value
                .map(|fill_value| array_bytes_to_elements::<f64>(fill_value.as_ne_bytes(), data_type))
                .transpose()?
                .and_then(|nodata| nodata.first().copied());
            let nodata_f64 = nodata.unwrap_or(f64::NAN);
            let mut output = vec![nodata_f64; destination.bytes.len() / data_type.size()];
            for row in rows {
                let row_window = source_window(row, source_rows, destination_rows);
                for column in 0..destination_columns {
                    let (mut sum, mut count) = (0.0, 0u32);
                    for source_row in row_window.clone() {
                        for source_column in source_window(column, source_columns, destination_columns) {
                            let value = values[source.index(source_row, source_column)];
                            if value.is_nan() || Some(value) == nodata {
                                continue;
                            }
                            sum += value;
                            count += 1;
                        }
                    }
                    if count > 0 {
                        output[destination.index(row, column)] = sum / f64::from(count);
                    }
                }
            }
            destination.bytes = elements_to_array_bytes(&output, data_type)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resampling_names() {
        assert_eq!(Resampling::from_str("").unwrap(), Resampling::Nearest);
        assert_eq!(Resampling::from_str("average").unwrap(), Resampling::Average);
        assert_eq!(Resampling::Average.name(), "AVERAGE");
        assert!(matches!(
            Resampling::from_str("cubic"),
            Err(OverviewError::UnsupportedResampling(_))
        ));
    }

    #[test]
    fn resampling_windows() {
        assert_eq!(source_window(0, 100, 50), 0..2);
        assert_eq!(source_window(49, 100, 50), 98..100);
        assert_eq!(source_window(24, 49, 25), 47..49);
        assert_eq!(source_nearest(0, 100, 50), 1);
        assert_eq!(source_nearest(24, 49, 25), 48);
        assert_eq!(source_rows(Resampling::Average, 10..20, 100, 50), 20..40);
    }

    fn window(values: &[u8], rows: u64, columns: u64) -> RasterWindow {
        RasterWindow {
            bytes: values.to_vec(),
            row_start: 0,
            rows,
            columns,
            row_major: true,
        }
    }

    #[test]
    fn resample_nearest_and_average() {
        #[rustfmt::skip]
        let source = window(&[
            1, 2, 3, 4,
            5, 6, 7, 8,
            0, 0, 9, 9,
            0, 4, 9, 9,
        ], 4, 4);
        let mut destination = window(&[0; 4], 2, 2);
        resample(Resampling::Nearest, &DataType::UInt8, None, &source, (4, 4), &mut destination, (2, 2)).unwrap();
        assert_eq!(destination.bytes, vec![6, 8, 4, 9]);

        let mut destination = window(&[0; 4], 2, 2);
        let fill_value = FillValue::from(0u8);
        resample(Resampling::Average, &DataType::UInt8, Some(&fill_value), &source, (4, 4), &mut destination, (2, 2)).unwrap();
        assert_eq!(destination.bytes, vec![4, 6, 4, 9]);
    }

    #[test]
    fn resample_column_major() {
        let source = RasterWindow {
            bytes: vec![1, 3, 2, 4],
            row_start: 0,
            rows: 2,
            columns: 2,
            row_major: false,
        };
        let mut destination = window(&[0], 1, 1);
        resample(Resampling::Average, &DataType::UInt8, None, &source, (2, 2), &mut destination, (1, 1)).unwrap();
        assert_eq!(destination.bytes, vec![3]);
    }
}

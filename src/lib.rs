//! A chunked N-dimensional array storage engine following the [Zarr V3](https://zarr.dev) layout.
//!
//! Arrays are persisted as a hierarchy of chunk files (optionally grouped into shards by the `sharding_indexed` codec), each independently encoded by a [codec chain](crate::array::codec::CodecChain).
//! On top of the storage layout the engine provides:
//!  - a block cache with a single dirty write slot per array,
//!  - [prefetching](crate::array::Array::advise_read) of array regions, grouped per shard or partitioned across worker threads,
//!  - write-back of dirty chunks, with read-modify-write aggregation of sharded chunks so that each shard is encoded once per flush,
//!  - a parallel fast path for chunk-aligned bulk writes, and
//!  - [overview pyramids](crate::array::Array::build_overviews) stored as sibling groups described by `multiscales` metadata.
//!
//! ## Example
//! ```rust,ignore
//! # use std::sync::Arc;
//! use zarrs_engine::array::{ArrayBuilder, DataType, FillValue};
//! use zarrs_engine::array_subset::ArraySubset;
//! use zarrs_engine::storage::store::FilesystemStore;
//!
//! let store = Arc::new(FilesystemStore::new("/path/to/store")?);
//! let mut array = ArrayBuilder::new(vec![100, 100], DataType::Float32, vec![32, 32], FillValue::from(f32::NAN))
//!     .build(store, "/group/array")?;
//! array.store_metadata()?;
//! array.store_array_subset_elements::<f32>(&ArraySubset::new_with_ranges(&[0..32, 0..32]), &vec![1.0; 32 * 32])?;
//! array.flush()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//!  - Codecs: `crc32c`, `gzip`, `zstd` (all default). `bytes`, `transpose` and `sharding_indexed` are always available.
//!
//! ## Logging
//! The crate logs through the [`log`] facade.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod array;
pub mod array_subset;
pub mod byte_range;
pub mod config;
pub mod group;
pub mod metadata;
pub mod node;
pub mod plugin;
pub mod storage;

//! Local storage layers for forecast grids.
//!
//! - [`catalog`]: TTL-cached discovery of forecast files on disk
//! - [`grid_cache`]: single-flight, byte-budgeted in-memory grid cache
//! - [`disk_cache`]: optional on-disk store of decoded grids for warm starts

pub mod catalog;
pub mod disk_cache;
pub mod grid_cache;

pub use catalog::{discover, CatalogError, FileCatalog, FORECAST_EXTENSIONS};
pub use disk_cache::{DiskCacheError, DiskGridStore};
pub use grid_cache::{GridCache, GridCacheConfig, GridCacheStats, GridResult};

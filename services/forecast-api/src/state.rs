//! Application state shared by the handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use forecast_common::DecodeError;
use grib_decoder::{GribFileDecoder, GridDecoder};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{DiskGridStore, FileCatalog, GridCache, GridCacheConfig};
use tracing::info;

use crate::config::ServiceConfig;

/// Shared application state.
pub struct AppState {
    pub config: ServiceConfig,

    /// Cached listing of the forecast files.
    pub catalog: FileCatalog,

    /// Decoded, normalized grids by path.
    pub grid_cache: GridCache,

    /// Renders `/metrics`; absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state that decodes files with the GRIB2 decoder.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Self::with_decoder(config, Arc::new(GribFileDecoder::default()))
    }

    pub fn with_decoder(config: ServiceConfig, decoder: Arc<dyn GridDecoder>) -> Result<Self> {
        let mut grid_cache = GridCache::new(
            decoder,
            GridCacheConfig {
                max_bytes: config.grid_cache_bytes,
                decode_workers: config.decode_workers,
            },
        );

        if let Some(dir) = &config.cache_dir {
            let store = DiskGridStore::open(dir)
                .with_context(|| format!("Failed to open grid disk store at {}", dir.display()))?;
            grid_cache = grid_cache.with_disk_store(store);
        }

        let catalog = FileCatalog::new(&config.forecasts_dir, config.cache_clear_interval);

        info!(
            forecasts_dir = %config.forecasts_dir.display(),
            step_policy = %config.step_policy,
            "Application state initialized"
        );

        Ok(Self {
            config,
            catalog,
            grid_cache,
            prometheus: None,
        })
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Resolve a caller-supplied file against the forecasts root and
    /// canonicalize it, so every spelling of a file shares one cache key.
    ///
    /// Files that cannot be resolved fail here and never reach the cache.
    pub async fn resolve_file(&self, file: &str) -> Result<PathBuf, DecodeError> {
        let path = Path::new(file);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.forecasts_dir.join(path)
        };

        tokio::fs::canonicalize(&joined)
            .await
            .map_err(|e| DecodeError::from_io(&joined, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_common::DecodeCause;

    #[tokio::test]
    async fn test_resolve_file_canonicalizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("gfs")).unwrap();
        std::fs::write(dir.path().join("gfs/t.grib2"), b"GRIB").unwrap();
        let root = dir.path().canonicalize().unwrap();
        let state = AppState::new(ServiceConfig::for_forecasts_dir(dir.path())).unwrap();

        let expected = root.join("gfs/t.grib2");
        assert_eq!(state.resolve_file("gfs/t.grib2").await.unwrap(), expected);
        assert_eq!(state.resolve_file("./gfs/../gfs/t.grib2").await.unwrap(), expected);
        let absolute = dir.path().join("gfs/t.grib2");
        assert_eq!(
            state.resolve_file(absolute.to_str().unwrap()).await.unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_resolve_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(ServiceConfig::for_forecasts_dir(dir.path())).unwrap();

        let err = state.resolve_file("absent.grib2").await.unwrap_err();
        assert_eq!(err.cause, DecodeCause::NotFound);
        assert_eq!(err.path, dir.path().join("absent.grib2"));
    }
}

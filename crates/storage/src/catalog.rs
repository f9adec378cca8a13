//! Discovery of forecast files on the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// File extensions recognized as forecast files (compared case-insensitively).
pub const FORECAST_EXTENSIONS: [&str; 2] = ["grib", "grib2"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("file discovery task failed: {0}")]
    Scan(String),
}

struct Listing {
    files: Arc<Vec<PathBuf>>,
    listed_at: Instant,
}

/// Cached, sorted listing of the forecast files under a root directory.
///
/// The listing is rebuilt only when it is older than the TTL or after
/// [`FileCatalog::invalidate`]; files added in between stay invisible.
pub struct FileCatalog {
    root: PathBuf,
    ttl: Duration,
    listing: Mutex<Option<Listing>>,
}

impl FileCatalog {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            listing: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the cached listing, rescanning when it has expired.
    pub async fn list_files(&self) -> Result<Arc<Vec<PathBuf>>, CatalogError> {
        let mut listing = self.listing.lock().await;

        if let Some(current) = listing.as_ref() {
            if current.listed_at.elapsed() < self.ttl {
                return Ok(current.files.clone());
            }
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || discover(&root))
            .await
            .map_err(|e| CatalogError::Scan(e.to_string()))?;
        let files = Arc::new(files);

        debug!(root = %self.root.display(), count = files.len(), "Forecast files listed");
        metrics::gauge!("forecast_catalog_files").set(files.len() as f64);

        *listing = Some(Listing {
            files: files.clone(),
            listed_at: Instant::now(),
        });
        Ok(files)
    }

    /// Drop the cached listing; the next call rescans.
    pub async fn invalidate(&self) {
        if self.listing.lock().await.take().is_some() {
            info!(root = %self.root.display(), "File catalog invalidated");
        }
    }
}

fn is_forecast_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FORECAST_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Walk `root` recursively and return forecast files as absolute paths,
/// sorted by file name and then by full path.
///
/// A missing or unreadable root yields an empty list.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable catalog entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_forecast_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    files
}

//! Common test fixtures: forecast directories, in-memory grids and
//! instrumented decoders.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use forecast_common::{DecodeError, DecodedGrid, GridMetadata, StepUnits};
use grib_decoder::{GribFileDecoder, GridDecoder};
use tempfile::TempDir;

use crate::generators::{create_test_grid, Grib2Builder};

/// A temporary forecasts directory, removed on drop.
pub struct ForecastDir {
    dir: TempDir,
}

impl ForecastDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp forecasts dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a synthetic GRIB2 file at `relative` (parent dirs are created).
    pub fn write_grib(&self, relative: &str, builder: &Grib2Builder) -> PathBuf {
        let path = self.prepare(relative);
        builder.write_to(&path).expect("write GRIB fixture");
        path
    }

    /// Write arbitrary bytes at `relative`.
    pub fn write_bytes(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.prepare(relative);
        std::fs::write(&path, bytes).expect("write fixture");
        path
    }

    fn prepare(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dirs");
        }
        path
    }
}

impl Default for ForecastDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata for a plain (non-accumulated) field valid at `valid_time_ms`.
pub fn sample_metadata(short_name: &str, valid_time_ms: i64) -> GridMetadata {
    GridMetadata {
        short_name: short_name.to_string(),
        valid_time_ms,
        step_range: "0".to_string(),
        step_units: StepUnits::Hours,
        step: 0,
        scanning_mode: 0,
    }
}

/// A `rows` x `cols` one-degree grid starting at 10N 0E, north to south,
/// with `create_test_grid` values.
pub fn sample_grid(rows: usize, cols: usize, metadata: GridMetadata) -> DecodedGrid {
    let mut lats = Vec::with_capacity(rows * cols);
    let mut lons = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            lats.push(10.0 - row as f64);
            lons.push(col as f64);
        }
    }

    DecodedGrid::new(metadata, rows, cols, create_test_grid(cols, rows), lats, lons)
        .expect("sample grid shape")
}

/// Wraps the file decoder, counting calls and optionally slowing each one down.
pub struct CountingDecoder {
    inner: GribFileDecoder,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingDecoder {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Sleep for `delay` inside every decode, to widen race windows.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: GribFileDecoder::default(),
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for CountingDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GridDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedGrid, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.decode(path)
    }
}

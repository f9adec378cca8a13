//! File-level decoding into [`DecodedGrid`].

use std::path::Path;

use bytes::Bytes;
use forecast_common::{DecodeCause, DecodeError, DecodedGrid, GridMetadata, StepUnits};
use tracing::debug;

use crate::message::{first_message, Grib2Message};
use crate::sections::{GridDefinition, MISSING_U32};
use crate::tables::Grib2Tables;
use crate::Grib2Error;

/// Scanning-mode flag bits (code table 3.4).
const SCAN_I_NEGATIVE: u8 = 0x80;
const SCAN_J_POSITIVE: u8 = 0x40;
const SCAN_J_CONSECUTIVE: u8 = 0x20;
const SCAN_BOUSTROPHEDON: u8 = 0x10;

/// Turns one forecast file into a decoded grid.
///
/// Implementations must be deterministic per file; the result is memoized.
pub trait GridDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedGrid, DecodeError>;
}

/// Decoder for GRIB2 files on the local filesystem.
#[derive(Debug, Clone)]
pub struct GribFileDecoder {
    tables: Grib2Tables,
}

impl GribFileDecoder {
    pub fn new(tables: Grib2Tables) -> Self {
        Self { tables }
    }
}

impl Default for GribFileDecoder {
    fn default() -> Self {
        Self::new(Grib2Tables::standard())
    }
}

impl GridDecoder for GribFileDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedGrid, DecodeError> {
        let data = std::fs::read(path).map_err(|e| DecodeError::from_io(path, &e))?;
        debug!(path = %path.display(), size = data.len(), "Decoding GRIB file");
        decode_bytes(path, Bytes::from(data), &self.tables)
    }
}

/// Decode the first message of an in-memory GRIB2 file.
pub fn decode_bytes(
    path: &Path,
    data: Bytes,
    tables: &Grib2Tables,
) -> Result<DecodedGrid, DecodeError> {
    let fail = |cause: DecodeCause| DecodeError::new(path, cause);

    let message = first_message(data)
        .map_err(|e| fail(e.into()))?
        .ok_or_else(|| fail(DecodeCause::NoMessages))?;

    let (rows, cols) = message.grid_dims();
    let metadata = metadata(&message, tables).map_err(|e| fail(e.into()))?;
    let (lats, lons) = coordinates(&message.grid_definition).map_err(|e| fail(e.into()))?;
    let values = message.unpack_data().map_err(|e| fail(e.into()))?;

    DecodedGrid::new(metadata, rows, cols, values, lats, lons).map_err(fail)
}

fn metadata(message: &Grib2Message, tables: &Grib2Tables) -> Result<GridMetadata, Grib2Error> {
    let pd = &message.product_definition;
    Ok(GridMetadata {
        short_name: tables
            .short_name(
                message.indicator.discipline,
                pd.parameter_category,
                pd.parameter_number,
            )
            .to_string(),
        valid_time_ms: message.valid_time()?.timestamp_millis(),
        step_range: message.step_range(),
        step_units: StepUnits::from_code(pd.time_unit),
        step: message.step(),
        scanning_mode: message.grid_definition.scanning_mode,
    })
}

/// Latitude/longitude of every grid point, row-major (Nj rows of Ni points),
/// in the order the values are stored.
pub fn coordinates(grid: &GridDefinition) -> Result<(Vec<f64>, Vec<f64>), Grib2Error> {
    let mode = grid.scanning_mode;
    if mode & (SCAN_J_CONSECUTIVE | SCAN_BOUSTROPHEDON) != 0 {
        return Err(Grib2Error::UnsupportedScanningMode(mode));
    }

    let ni = grid.ni as usize;
    let nj = grid.nj as usize;

    let lo1 = grid.lo1 as f64 / 1e6;
    let la1 = grid.la1 as f64 / 1e6;
    let di = increment(grid.di, grid.lo1, grid.lo2, ni, true);
    let dj = increment(grid.dj, grid.la1, grid.la2, nj, false);

    let i_sign = if mode & SCAN_I_NEGATIVE != 0 { -1.0 } else { 1.0 };
    let j_sign = if mode & SCAN_J_POSITIVE != 0 { 1.0 } else { -1.0 };

    let row_lons: Vec<f64> = (0..ni)
        .map(|i| {
            let lon = lo1 + i_sign * di * i as f64;
            if lon >= 360.0 {
                lon - 360.0
            } else {
                lon
            }
        })
        .collect();

    let points = ni.checked_mul(nj).ok_or_else(|| {
        Grib2Error::InvalidFormat(format!("Grid {}x{} overflows", grid.ni, grid.nj))
    })?;
    let mut lats = Vec::with_capacity(points);
    let mut lons = Vec::with_capacity(points);
    for j in 0..nj {
        let lat = la1 + j_sign * dj * j as f64;
        lats.extend(std::iter::repeat(lat).take(ni));
        lons.extend_from_slice(&row_lons);
    }

    Ok((lats, lons))
}

/// Increment in degrees; derived from the first/last points when marked missing.
fn increment(raw: u32, first: i32, last: i32, count: usize, is_longitude: bool) -> f64 {
    if raw != MISSING_U32 {
        return raw as f64 / 1e6;
    }
    if count < 2 {
        return 0.0;
    }

    let mut span = (last as f64 - first as f64).abs() / 1e6;
    if is_longitude && last < first {
        span = 360.0 - span;
    }
    span / (count - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(scanning_mode: u8) -> GridDefinition {
        GridDefinition {
            template: 0,
            num_data_points: 6,
            ni: 3,
            nj: 2,
            la1: 10_000_000,
            lo1: 350_000_000,
            la2: 9_000_000,
            lo2: 10_000_000,
            di: 10_000_000,
            dj: 1_000_000,
            scanning_mode,
        }
    }

    #[test]
    fn test_coordinates_north_to_south() {
        let (lats, lons) = coordinates(&grid(0)).unwrap();

        assert_eq!(lats, vec![10.0, 10.0, 10.0, 9.0, 9.0, 9.0]);
        assert_eq!(lons, vec![350.0, 0.0, 10.0, 350.0, 0.0, 10.0]);
    }

    #[test]
    fn test_coordinates_south_to_north() {
        let mut g = grid(SCAN_J_POSITIVE);
        g.la1 = 9_000_000;
        let (lats, _) = coordinates(&g).unwrap();

        assert_eq!(lats, vec![9.0, 9.0, 9.0, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_missing_increment_is_derived() {
        let mut g = grid(0);
        g.di = MISSING_U32;
        let (_, lons) = coordinates(&g).unwrap();

        // 350 -> 10 across the meridian is a 20 degree span over 2 steps
        assert_eq!(&lons[..3], &[350.0, 0.0, 10.0]);
    }

    #[test]
    fn test_column_major_scanning_is_unsupported() {
        assert!(matches!(
            coordinates(&grid(SCAN_J_CONSECUTIVE)),
            Err(Grib2Error::UnsupportedScanningMode(_))
        ));
    }

    #[test]
    fn test_empty_bytes_have_no_messages() {
        let err = decode_bytes(
            Path::new("empty.grib2"),
            Bytes::new(),
            &Grib2Tables::standard(),
        )
        .unwrap_err();

        assert_eq!(err.cause, DecodeCause::NoMessages);
    }

    #[test]
    fn test_garbage_bytes_are_invalid_format() {
        let err = decode_bytes(
            Path::new("notes.grib"),
            Bytes::from_static(b"this is not a forecast"),
            &Grib2Tables::standard(),
        )
        .unwrap_err();

        assert!(matches!(err.cause, DecodeCause::InvalidFormat(_)));
    }
}

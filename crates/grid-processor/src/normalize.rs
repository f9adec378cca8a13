//! Scanning-mode and longitude normalization of decoded grids.

use forecast_common::{normalize_longitude, DecodedGrid, SCANNING_MODE_J_POSITIVE};
use tracing::trace;

/// Bring a freshly decoded grid into the orientation lookups expect.
///
/// When the raw scanning mode is [`SCANNING_MODE_J_POSITIVE`] the row order of
/// the latitude and value arrays is reversed; longitudes are left in place.
/// Every negative longitude is then shifted by +360.
///
/// A grid that is already normalized is returned unchanged.
pub fn normalize(mut grid: DecodedGrid) -> DecodedGrid {
    if grid.is_normalized() {
        return grid;
    }

    let rows = grid.rows();
    let cols = grid.cols();
    let flip = grid.metadata().scanning_mode == SCANNING_MODE_J_POSITIVE;

    let (values, lats, lons) = grid.arrays_mut();
    if flip {
        trace!(rows, cols, "Flipping grid rows");
        flip_rows(values, cols);
        flip_rows(lats, cols);
    }

    for lon in lons.iter_mut() {
        *lon = normalize_longitude(*lon);
    }

    grid.mark_normalized();
    grid
}

/// Reverse the order of the `cols`-wide rows of a row-major array.
fn flip_rows<T>(data: &mut [T], cols: usize) {
    if cols == 0 {
        return;
    }
    let rows = data.len() / cols;
    for row in 0..rows / 2 {
        let (head, tail) = data.split_at_mut((rows - 1 - row) * cols);
        head[row * cols..(row + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }
}

//! Nearest grid point lookup.

use forecast_common::{DecodedGrid, QueryPoint};

/// The grid cell closest to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub lat: f64,
    pub lon: f64,
    pub value: f32,
    pub row: usize,
    pub col: usize,
    pub index: usize,
}

/// Find the cell minimizing `sqrt((lat - p.lat)^2 + (lon - p.lon)^2)`.
///
/// Distances are plain Euclidean in degree space, not great-circle. The grid
/// must be normalized and `point` already in [0, 360) longitude space. Ties go
/// to the first cell in row-major order; cells with NaN coordinates never
/// match. Returns `None` for an empty grid or when every distance is NaN.
pub fn locate(grid: &DecodedGrid, point: QueryPoint) -> Option<NearestPoint> {
    let mut best: Option<(usize, f64)> = None;

    for (index, (lat, lon)) in grid.lats().iter().zip(grid.lons()).enumerate() {
        let distance = ((lat - point.lat).powi(2) + (lon - point.lon).powi(2)).sqrt();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if distance >= current => {}
            _ => best = Some((index, distance)),
        }
    }

    best.map(|(index, _)| {
        let (row, col) = grid.row_col(index);
        NearestPoint {
            lat: grid.lats()[index],
            lon: grid.lons()[index],
            value: grid.values()[index],
            row,
            col,
            index,
        }
    })
}

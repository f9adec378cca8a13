//! Result records for point and bounding-box queries.

use std::path::Path;

use forecast_common::{
    normalize_longitude, BoundingBox, DecodedGrid, ForecastError, ForecastResult, QueryPoint,
    StepUnits,
};
use serde::Serialize;

use crate::forecast_time::{adjusted_time, StepPolicy};
use crate::nearest::locate;

/// One nearest-point answer for a (file, query point) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    /// Matched grid latitude.
    pub lat: f64,
    /// Matched grid longitude, in [0, 360).
    pub lon: f64,
    /// `None` (JSON `null`) when the matched cell is missing.
    pub value: Option<f32>,
    /// Adjusted forecast time, epoch milliseconds.
    pub forecast_time: i64,
    pub range: String,
    pub step: i64,
    pub step_units: StepUnits,
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub file: String,
}

/// A grid cell inside a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BboxCell {
    pub lat: f64,
    pub lon: f64,
    pub value: Option<f32>,
}

fn present(value: f32) -> Option<f32> {
    (!value.is_nan()).then_some(value)
}

/// Build one record per query point, in input order.
///
/// The grid must be normalized; query longitudes are normalized here.
pub fn point_records(
    grid: &DecodedGrid,
    file: &Path,
    points: &[QueryPoint],
    policy: StepPolicy,
) -> ForecastResult<Vec<ResultRecord>> {
    let metadata = grid.metadata();
    let adjusted = adjusted_time(metadata, policy)?;
    let file = file.display().to_string();

    points
        .iter()
        .map(|point| {
            let nearest = locate(grid, point.normalized()).ok_or(ForecastError::EmptyGrid)?;
            Ok(ResultRecord {
                lat: nearest.lat,
                lon: nearest.lon,
                value: present(nearest.value),
                forecast_time: adjusted.timestamp_ms,
                range: metadata.step_range.clone(),
                step: adjusted.step,
                step_units: metadata.step_units,
                short_name: metadata.short_name.clone(),
                file: file.clone(),
            })
        })
        .collect()
}

/// Every cell whose normalized coordinates fall inside `bbox`, in grid order.
pub fn cells_in_bbox(grid: &DecodedGrid, bbox: &BoundingBox) -> Vec<BboxCell> {
    grid.lats()
        .iter()
        .zip(grid.lons())
        .zip(grid.values())
        .filter_map(|((&lat, &lon), &value)| {
            let lon = normalize_longitude(lon);
            bbox.contains_point(lat, lon).then(|| BboxCell {
                lat,
                lon,
                value: present(value),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use forecast_common::GridMetadata;

    fn metadata(short_name: &str, step_range: &str, step_units: StepUnits) -> GridMetadata {
        GridMetadata {
            short_name: short_name.to_string(),
            valid_time_ms: 1_000,
            step_range: step_range.to_string(),
            step_units,
            step: 3,
            scanning_mode: 0,
        }
    }

    /// One row at latitude 0 with longitudes -5 (355), 0 and 5.
    fn row_grid(meta: GridMetadata) -> DecodedGrid {
        normalize(
            DecodedGrid::new(
                meta,
                1,
                3,
                vec![1.0, f32::NAN, 3.0],
                vec![0.0, 0.0, 0.0],
                vec![-5.0, 0.0, 5.0],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_point_records_follow_input_order() {
        let grid = row_grid(metadata("tp", "0-3", StepUnits::Hours));
        let points = [QueryPoint::new(0.0, 4.0), QueryPoint::new(0.0, -4.0)];

        let records =
            point_records(&grid, Path::new("/data/a.grib2"), &points, StepPolicy::UnitAware)
                .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lon, 5.0);
        assert_eq!(records[0].value, Some(3.0));
        assert_eq!(records[1].lon, 355.0);
        assert_eq!(records[1].value, Some(1.0));
        assert_eq!(records[0].forecast_time, 1_000 + 3 * 3_600_000);
        assert_eq!(records[0].file, "/data/a.grib2");
    }

    #[test]
    fn test_record_json_shape() {
        let grid = row_grid(metadata("tp", "0-3", StepUnits::Minutes));
        let records = point_records(
            &grid,
            Path::new("a.grib2"),
            &[QueryPoint::new(0.0, 0.0)],
            StepPolicy::UnitAware,
        )
        .unwrap();

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["shortName"], "tp");
        assert_eq!(json["range"], "0-3");
        assert_eq!(json["step_units"], "minutes");
        assert_eq!(json["step"], 3);
        assert!(json["value"].is_null());
    }

    #[test]
    fn test_unsupported_units_fail_the_file() {
        let grid = row_grid(metadata("tp", "0-3", StepUnits::Other(2)));
        let err = point_records(
            &grid,
            Path::new("a.grib2"),
            &[QueryPoint::new(0.0, 0.0)],
            StepPolicy::UnitAware,
        )
        .unwrap_err();

        assert_eq!(err, ForecastError::UnsupportedStepUnits(2));
    }

    #[test]
    fn test_bbox_across_prime_meridian() {
        let grid = row_grid(metadata("t", "0", StepUnits::Hours));
        let cells = cells_in_bbox(&grid, &BoundingBox::new(-1.0, 1.0, -10.0, 10.0));

        let lons: Vec<f64> = cells.iter().map(|c| c.lon).collect();
        assert_eq!(lons, vec![355.0, 0.0, 5.0]);
    }

    #[test]
    fn test_bbox_excludes_outside_cells() {
        let grid = row_grid(metadata("t", "0", StepUnits::Hours));

        let cells = cells_in_bbox(&grid, &BoundingBox::new(-1.0, 1.0, 1.0, 10.0));
        assert_eq!(cells, vec![BboxCell { lat: 0.0, lon: 5.0, value: Some(3.0) }]);

        assert!(cells_in_bbox(&grid, &BoundingBox::new(10.0, 20.0, 0.0, 10.0)).is_empty());
    }
}

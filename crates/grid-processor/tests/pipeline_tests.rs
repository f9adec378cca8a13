//! Decode -> normalize -> lookup on synthetic GRIB2 files.

use std::path::Path;

use forecast_common::{BoundingBox, QueryPoint};
use grib_decoder::{GribFileDecoder, GridDecoder};
use grid_processor::{cells_in_bbox, normalize, point_records, StepPolicy};
use test_utils::{assert_approx_eq, sample_grid, sample_metadata, ForecastDir, Grib2Builder};

const JAN_1_2024_MS: i64 = 1_704_067_200_000;

#[test]
fn test_south_to_north_grid_is_flipped_north_up() {
    let dir = ForecastDir::new();
    let path = dir.write_grib(
        "sn.grib2",
        &Grib2Builder::new()
            .with_grid(2, 2)
            .with_origin(-1.0, 0.0, 1.0, 1.0)
            .with_scanning_mode(64),
    );

    let grid = normalize(GribFileDecoder::default().decode(&path).unwrap());
    assert_eq!(grid.lats(), &[0.0, 0.0, -1.0, -1.0]);

    let records = point_records(
        &grid,
        &path,
        &[QueryPoint::new(0.0, 1.0)],
        StepPolicy::UnitAware,
    )
    .unwrap();

    assert_eq!((records[0].lat, records[0].lon), (0.0, 1.0));
    assert_approx_eq!(records[0].value.unwrap(), 1001.0, 0.05);
}

#[test]
fn test_precipitation_forecast_time_moves_to_interval_end() {
    let dir = ForecastDir::new();
    let path = dir.write_grib("tp.grib2", &Grib2Builder::precipitation(0, 1, 3));

    let grid = normalize(GribFileDecoder::default().decode(&path).unwrap());
    let point = [QueryPoint::new(10.0, 0.0)];

    let unit_aware = point_records(&grid, &path, &point, StepPolicy::UnitAware).unwrap();
    assert_eq!(unit_aware[0].forecast_time, JAN_1_2024_MS + 3 * 3_600_000);
    assert_eq!(unit_aware[0].range, "0-3");
    assert_eq!(unit_aware[0].step, 3);
    assert_eq!(unit_aware[0].short_name, "tp");

    let legacy = point_records(&grid, &path, &point, StepPolicy::Legacy).unwrap();
    assert_eq!(legacy[0].forecast_time, JAN_1_2024_MS + 3 * 60_000);
    assert_eq!(legacy[0].step, 60);
}

#[test]
fn test_negative_longitudes_are_reachable_from_both_signs() {
    let dir = ForecastDir::new();
    let path = dir.write_grib(
        "west.grib2",
        &Grib2Builder::new()
            .with_grid(3, 1)
            .with_origin(0.0, -10.0, 1.0, 5.0),
    );

    let grid = normalize(GribFileDecoder::default().decode(&path).unwrap());
    assert_eq!(grid.lons(), &[350.0, 355.0, 0.0]);

    let records = point_records(
        &grid,
        &path,
        &[QueryPoint::new(0.0, -5.0), QueryPoint::new(0.0, 355.0)],
        StepPolicy::UnitAware,
    )
    .unwrap();
    assert_eq!(records[0].lon, 355.0);
    assert_eq!(records[0], records[1]);

    let cells = cells_in_bbox(&grid, &BoundingBox::new(-1.0, 1.0, -6.0, 1.0));
    let lons: Vec<f64> = cells.iter().map(|c| c.lon).collect();
    assert_eq!(lons, vec![355.0, 0.0]);
}

#[test]
fn test_query_on_a_grid_node_returns_its_value_exactly() {
    let grid = normalize(sample_grid(4, 5, sample_metadata("t", JAN_1_2024_MS)));
    let file = Path::new("memory.grib2");

    for row in 0..4 {
        for col in 0..5 {
            let point = QueryPoint::new(10.0 - row as f64, col as f64);
            let records = point_records(&grid, file, &[point], StepPolicy::UnitAware).unwrap();

            assert_eq!(records[0].value, Some((col * 1000 + row) as f32));
            assert_eq!(records[0].forecast_time, JAN_1_2024_MS);
            assert_eq!(records[0].file, "memory.grib2");
        }
    }
}

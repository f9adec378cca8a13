//! Nearest-point lookup across every forecast file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Extension, Query};
use axum::Json;
use forecast_common::{ForecastError, QueryPoint};
use grid_processor::{point_records, ResultRecord, StepPolicy};
use metrics::{counter, histogram};
use serde::Serialize;
use storage::GridResult;
use tracing::{debug, instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// A file whose grid could not be turned into records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

/// One element of the `data` array: a record or a per-file failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataEntry {
    Record(ResultRecord),
    Failure(FileFailure),
}

#[derive(Debug, Serialize)]
pub struct GribDataResponse {
    pub data: Vec<DataEntry>,
}

fn parse_coordinate(raw: &str) -> Result<f64, ApiError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(ApiError::invalid_coordinates)
}

/// Pair up repeated `lat`/`lon` parameters in the order given.
pub fn parse_points(params: &[(String, String)]) -> Result<Vec<QueryPoint>, ApiError> {
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    for (key, value) in params {
        match key.as_str() {
            "lat" => lats.push(parse_coordinate(value)?),
            "lon" => lons.push(parse_coordinate(value)?),
            _ => {}
        }
    }

    if lats.is_empty() && lons.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one lat/lon pair is required".to_string(),
        ));
    }
    if lats.len() != lons.len() {
        return Err(ApiError::BadRequest(format!(
            "Mismatched number of latitude ({}) and longitude ({}) values",
            lats.len(),
            lons.len()
        )));
    }

    Ok(lats
        .into_iter()
        .zip(lons)
        .map(|(lat, lon)| QueryPoint::new(lat, lon))
        .collect())
}

/// GET /get-grib-data?lat=..&lon=..[&lat=..&lon=..]
///
/// One record per (file, point), files in catalog order and points in
/// request order. A file that fails contributes a single failure entry.
#[instrument(skip_all)]
pub async fn grib_data_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<GribDataResponse>, ApiError> {
    let started = Instant::now();
    counter!("forecast_api_requests_total", "endpoint" => "grib_data").increment(1);

    let points = parse_points(&params)?;

    let files = state
        .catalog
        .list_files()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if files.is_empty() {
        return Err(ApiError::NotFound("No forecast files found".to_string()));
    }

    let grids = state.grid_cache.get_all(&files).await;
    let policy = state.config.step_policy;
    let point_count = points.len();

    // Nearest-point scans are linear in grid size
    let scan_files = Arc::clone(&files);
    let (data, failures) =
        tokio::task::spawn_blocking(move || collect_entries(&scan_files, grids, &points, policy))
            .await
            .map_err(|e| ApiError::Internal(format!("Point lookup task failed: {}", e)))?;

    histogram!("forecast_api_request_duration_seconds", "endpoint" => "grib_data")
        .record(started.elapsed().as_secs_f64());
    debug!(
        files = files.len(),
        points = point_count,
        failures,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Point lookup complete"
    );

    Ok(Json(GribDataResponse { data }))
}

/// Turn each file's grid into records, or a single failure entry.
/// Returns the entries and the number of failed files.
fn collect_entries(
    files: &[PathBuf],
    grids: Vec<GridResult>,
    points: &[QueryPoint],
    policy: StepPolicy,
) -> (Vec<DataEntry>, usize) {
    let mut data = Vec::with_capacity(files.len() * points.len());
    let mut failures = 0;
    for (file, grid) in files.iter().zip(grids) {
        let records = grid
            .map_err(ForecastError::from)
            .and_then(|grid| point_records(&grid, file, points, policy));

        match records {
            Ok(records) => data.extend(records.into_iter().map(DataEntry::Record)),
            Err(e) => {
                failures += 1;
                warn!(file = %file.display(), error = %e, "Skipping forecast file");
                data.push(DataEntry::Failure(FileFailure {
                    file: file.display().to_string(),
                    error: e.to_string(),
                }));
            }
        }
    }
    (data, failures)
}

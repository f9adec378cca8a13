//! All grid cells of one file inside a bounding box.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Extension, Query};
use axum::Json;
use forecast_common::BoundingBox;
use grid_processor::{cells_in_bbox, BboxCell};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Raw query parameters; bounds are parsed by hand so that missing and
/// non-numeric values get the same 400.
#[derive(Debug, Default, Deserialize)]
pub struct BboxParams {
    pub file: Option<String>,
    pub min_lat: Option<String>,
    pub max_lat: Option<String>,
    pub min_lon: Option<String>,
    pub max_lon: Option<String>,
}

impl BboxParams {
    /// Parse the four bounds; longitudes are normalized by [`BoundingBox::new`].
    pub fn bounding_box(&self) -> Result<BoundingBox, ApiError> {
        let bound = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or_else(ApiError::invalid_coordinates)
        };

        Ok(BoundingBox::new(
            bound(&self.min_lat)?,
            bound(&self.max_lat)?,
            bound(&self.min_lon)?,
            bound(&self.max_lon)?,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct BboxResponse {
    pub data: Vec<BboxCell>,
}

/// GET /get-grib-data-with-bbox?file=..&min_lat=..&max_lat=..&min_lon=..&max_lon=..
///
/// Decode failures answer 500 with the failure text.
#[instrument(skip_all)]
pub async fn bbox_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<BboxParams>,
) -> Result<Json<BboxResponse>, ApiError> {
    let started = Instant::now();
    counter!("forecast_api_requests_total", "endpoint" => "bbox").increment(1);

    let file = params
        .file
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing file parameter".to_string()))?;
    let bbox = params.bounding_box()?;
    let path = state
        .resolve_file(file)
        .await
        .map_err(|e| ApiError::InternalDetail(e.to_string()))?;

    let grid = state
        .grid_cache
        .get(&path)
        .await
        .map_err(|e| ApiError::InternalDetail(e.to_string()))?;

    let data = cells_in_bbox(&grid, &bbox);

    histogram!("forecast_api_request_duration_seconds", "endpoint" => "bbox")
        .record(started.elapsed().as_secs_f64());
    debug!(
        file = %path.display(),
        cells = data.len(),
        wraps = bbox.wraps(),
        "Bounding box lookup complete"
    );

    if data.is_empty() {
        return Err(ApiError::NotFound(
            "No data found in the specified bbox".to_string(),
        ));
    }

    Ok(Json(BboxResponse { data }))
}

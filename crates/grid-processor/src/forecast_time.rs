//! Forecast timestamp adjustment for accumulated products.

use std::fmt;
use std::str::FromStr;

use forecast_common::{ForecastError, ForecastResult, GridMetadata};
use serde::{Deserialize, Serialize};

/// Short name of total precipitation, the only accumulated field adjusted.
pub const TOTAL_PRECIPITATION: &str = "tp";

/// Step reported by the legacy policy and whenever no adjustment applies
/// under it, in minutes.
pub const LEGACY_STEP_MINUTES: i64 = 60;

/// How the end of an accumulation range is turned into a time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPolicy {
    /// Offset by `end` in the grid's step units (minutes or hours); other
    /// units are rejected. The reported step is the grid's own step.
    #[default]
    UnitAware,
    /// Deprecated: offset by `end` minutes regardless of units and always
    /// report a 60 minute step.
    Legacy,
}

impl fmt::Display for StepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepPolicy::UnitAware => write!(f, "unit-aware"),
            StepPolicy::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for StepPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unit-aware" | "unit_aware" => Ok(StepPolicy::UnitAware),
            "legacy" => Ok(StepPolicy::Legacy),
            other => Err(format!(
                "unknown step policy '{}', expected 'unit-aware' or 'legacy'",
                other
            )),
        }
    }
}

/// Display timestamp and step for one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedTime {
    pub timestamp_ms: i64,
    pub step: i64,
}

/// Compute the forecast timestamp shown to callers.
///
/// Only total precipitation with a ranged step (`"start-end"`) is moved, to
/// the end of its accumulation interval. Everything else keeps `valid_time_ms`.
pub fn adjusted_time(metadata: &GridMetadata, policy: StepPolicy) -> ForecastResult<AdjustedTime> {
    let step = match policy {
        StepPolicy::UnitAware => metadata.step,
        StepPolicy::Legacy => LEGACY_STEP_MINUTES,
    };
    let mut adjusted = AdjustedTime {
        timestamp_ms: metadata.valid_time_ms,
        step,
    };

    if metadata.short_name != TOTAL_PRECIPITATION {
        return Ok(adjusted);
    }
    let Some((start, end)) = metadata.step_range_bounds() else {
        return Ok(adjusted);
    };

    let invalid = || ForecastError::InvalidStepRange(metadata.step_range.clone());
    start.trim().parse::<i64>().map_err(|_| invalid())?;
    let end: i64 = end.trim().parse().map_err(|_| invalid())?;

    let unit_ms = match policy {
        StepPolicy::UnitAware => metadata
            .step_units
            .millis()
            .ok_or(ForecastError::UnsupportedStepUnits(metadata.step_units.code()))?,
        StepPolicy::Legacy => 60 * 1000,
    };

    adjusted.timestamp_ms += end * unit_ms;
    Ok(adjusted)
}

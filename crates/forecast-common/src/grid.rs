//! Decoded forecast grids.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::DecodeCause;

/// Scanning-mode value whose rows are stored in the opposite latitude order
/// and must be flipped vertically before use.
pub const SCANNING_MODE_J_POSITIVE: u8 = 64;

/// Unit of the forecast step (GRIB2 code table 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepUnits {
    Minutes,
    Hours,
    /// Any other code, kept raw. Adjusting time with these units fails.
    Other(u8),
}

impl StepUnits {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => StepUnits::Minutes,
            1 => StepUnits::Hours,
            other => StepUnits::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            StepUnits::Minutes => 0,
            StepUnits::Hours => 1,
            StepUnits::Other(code) => *code,
        }
    }

    /// Milliseconds in one step unit, if the unit is supported.
    pub fn millis(&self) -> Option<i64> {
        match self {
            StepUnits::Minutes => Some(60 * 1000),
            StepUnits::Hours => Some(60 * 60 * 1000),
            StepUnits::Other(_) => None,
        }
    }
}

/// Serialized as `"minutes"`, `"hours"`, or the raw numeric code.
impl Serialize for StepUnits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StepUnits::Minutes => serializer.serialize_str("minutes"),
            StepUnits::Hours => serializer.serialize_str("hours"),
            StepUnits::Other(code) => serializer.serialize_u8(*code),
        }
    }
}

mod step_units_code {
    use super::StepUnits;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(units: &StepUnits, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(units.code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StepUnits, D::Error> {
        u8::deserialize(deserializer).map(StepUnits::from_code)
    }
}

/// Message metadata carried alongside the decoded arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    /// Physical quantity, e.g. "tp" for total precipitation.
    pub short_name: String,
    /// Nominal valid time in epoch milliseconds, before any accumulation adjustment.
    pub valid_time_ms: i64,
    /// "start-end" for accumulated products, a single number otherwise.
    pub step_range: String,
    #[serde(with = "step_units_code")]
    pub step_units: StepUnits,
    pub step: i64,
    /// Raw scanning-mode flags as found in the file.
    pub scanning_mode: u8,
}

impl GridMetadata {
    /// Split a ranged step into its integer sides. `None` when there is no `-`.
    pub fn step_range_bounds(&self) -> Option<(&str, &str)> {
        self.step_range.split_once('-')
    }
}

/// Co-indexed value/latitude/longitude arrays for one GRIB message, row-major.
///
/// `values[i]` is observed at `(lats[i], lons[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGrid {
    metadata: GridMetadata,
    rows: usize,
    cols: usize,
    values: Vec<f32>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    normalized: bool,
}

impl DecodedGrid {
    /// Create a grid, checking that all three arrays have `rows * cols` points.
    pub fn new(
        metadata: GridMetadata,
        rows: usize,
        cols: usize,
        values: Vec<f32>,
        lats: Vec<f64>,
        lons: Vec<f64>,
    ) -> Result<Self, DecodeCause> {
        let expected = rows * cols;
        for (array, actual) in [
            ("values", values.len()),
            ("lats", lats.len()),
            ("lons", lons.len()),
        ] {
            if actual != expected {
                return Err(DecodeCause::ShapeMismatch {
                    expected,
                    array,
                    actual,
                });
            }
        }

        Ok(Self {
            metadata,
            rows,
            cols,
            values,
            lats,
            lons,
            normalized: false,
        })
    }

    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Mutable access to the three arrays, for in-place transforms.
    pub fn arrays_mut(&mut self) -> (&mut [f32], &mut [f64], &mut [f64]) {
        (&mut self.values, &mut self.lats, &mut self.lons)
    }

    /// Whether the grid already went through normalization.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn mark_normalized(&mut self) {
        self.normalized = true;
    }

    /// Row and column of a flat index.
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        if self.cols == 0 {
            return (0, 0);
        }
        (index / self.cols, index % self.cols)
    }

    /// Approximate heap footprint, used for cache budgeting.
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.values.len() * std::mem::size_of::<f32>()
            + (self.lats.len() + self.lons.len()) * std::mem::size_of::<f64>()
            + self.metadata.short_name.len()
            + self.metadata.step_range.len()
    }
}

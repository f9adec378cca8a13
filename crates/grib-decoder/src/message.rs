//! A single parsed GRIB2 message.

use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::sections::{
    self, Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
use crate::tables::time_unit_seconds;
use crate::unpacking::unpack_simple;
use crate::Grib2Error;

/// Data representation template for simple packing.
const SIMPLE_PACKING: u16 = 0;

/// Upper bound on grid points per message. A 0.05 degree global grid is ~26M.
pub const MAX_GRID_POINTS: u64 = 100_000_000;

/// Locate and parse the first GRIB2 message in `data`.
///
/// Returns `Ok(None)` for empty input. Bytes before the first `GRIB` magic
/// (e.g. WMO bulletin headers) are skipped.
pub fn first_message(data: Bytes) -> Result<Option<Grib2Message>, Grib2Error> {
    if data.is_empty() {
        return Ok(None);
    }

    let start = data
        .windows(4)
        .position(|w| w == b"GRIB")
        .ok_or_else(|| Grib2Error::InvalidFormat("GRIB magic bytes not found".to_string()))?;

    Grib2Message::parse(data.slice(start..)).map(Some)
}

/// Parsed sections of one GRIB2 message.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    raw: Bytes,
}

impl Grib2Message {
    /// Parse the message that starts at the beginning of `data`.
    pub fn parse(data: Bytes) -> Result<Self, Grib2Error> {
        let indicator = sections::parse_indicator(&data)?;

        let length = usize::try_from(indicator.message_length)
            .ok()
            .filter(|len| *len >= 16 && *len <= data.len())
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "Message length {} exceeds available {} bytes",
                    indicator.message_length,
                    data.len()
                ))
            })?;
        let raw = data.slice(..length);

        let identification = sections::parse_identification(&raw)?;
        let grid_definition = sections::parse_grid_definition(&raw)?;
        let product_definition = sections::parse_product_definition(&raw)?;
        let data_representation = sections::parse_data_representation(&raw)?;
        let bitmap = sections::parse_bitmap(&raw)?;
        let data_section = sections::parse_data_section(&raw)?;

        check_layout(&grid_definition, &data_representation, bitmap.as_ref(), &data_section)?;

        Ok(Self {
            indicator,
            identification,
            grid_definition,
            product_definition,
            data_representation,
            bitmap,
            data_section,
            raw,
        })
    }

    /// (rows, cols) of the grid: Nj by Ni.
    pub fn grid_dims(&self) -> (usize, usize) {
        (
            self.grid_definition.nj as usize,
            self.grid_definition.ni as usize,
        )
    }

    /// Number of grid points, Ni * Nj. Bounded by [`check_layout`] at parse time.
    pub fn num_points(&self) -> u32 {
        self.grid_definition.num_data_points
    }

    /// Reference time plus the forecast time offset (start of any accumulation interval).
    pub fn valid_time(&self) -> Result<DateTime<Utc>, Grib2Error> {
        let reference = self.identification.reference_time;
        let pd = &self.product_definition;
        let Some(unit) = time_unit_seconds(pd.time_unit) else {
            return Ok(reference);
        };

        unit.checked_mul(pd.forecast_time as i64)
            .and_then(Duration::try_seconds)
            .and_then(|offset| reference.checked_add_signed(offset))
            .ok_or_else(|| Grib2Error::InvalidSection {
                section: 4,
                reason: format!(
                    "Forecast time {} (unit {}) overflows the valid time",
                    pd.forecast_time, pd.time_unit
                ),
            })
    }

    /// `"start-end"` for statistically processed products, `"start"` otherwise.
    pub fn step_range(&self) -> String {
        let pd = &self.product_definition;
        match pd.time_range {
            Some(_) => format!("{}-{}", pd.forecast_time, self.range_end()),
            None => pd.forecast_time.to_string(),
        }
    }

    /// End of the step: the end of the accumulation interval, or the forecast time.
    pub fn step(&self) -> i64 {
        match self.product_definition.time_range {
            Some(_) => self.range_end(),
            None => self.product_definition.forecast_time as i64,
        }
    }

    /// End of the statistical interval, expressed in the product's time unit.
    fn range_end(&self) -> i64 {
        let pd = &self.product_definition;
        let Some(range) = pd.time_range else {
            return pd.forecast_time as i64;
        };

        let length = if range.unit == pd.time_unit {
            range.length as i64
        } else {
            match (time_unit_seconds(range.unit), time_unit_seconds(pd.time_unit)) {
                (Some(range_secs), Some(unit_secs)) => {
                    range.length as i64 * range_secs / unit_secs
                }
                _ => range.length as i64,
            }
        };

        pd.forecast_time as i64 + length
    }

    /// Unpack the data values, applying the bitmap. Missing points are NaN.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        let dr = &self.data_representation;

        if dr.template != SIMPLE_PACKING {
            debug!(template = dr.template, "Delegating unpacking to grib crate");
            return self.unpack_with_grib_crate();
        }

        let bitmap = self.bitmap.as_ref().map(|b| b.data.as_ref());
        let num_points = if bitmap.is_some() {
            self.num_points()
        } else {
            dr.num_data_points
        };

        unpack_simple(
            &self.data_section.data,
            num_points,
            dr.bits_per_value,
            dr.reference_value,
            dr.binary_scale_factor,
            dr.decimal_scale_factor,
            bitmap,
        )
    }

    fn unpack_with_grib_crate(&self) -> Result<Vec<f32>, Grib2Error> {
        let grib_file = grib::from_reader(Cursor::new(self.raw.clone()))
            .map_err(|e| Grib2Error::UnpackingError(e.to_string()))?;

        let (_, submessage) = grib_file
            .iter()
            .next()
            .ok_or_else(|| Grib2Error::UnpackingError("no submessage found".to_string()))?;

        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| Grib2Error::UnpackingError(e.to_string()))?;
        let values = decoder
            .dispatch()
            .map_err(|e| Grib2Error::UnpackingError(e.to_string()))?;

        Ok(values.collect())
    }
}

/// Reject messages whose declared dimensions disagree with each other or
/// with the bytes actually present, before anything is sized from them.
fn check_layout(
    grid: &GridDefinition,
    dr: &DataRepresentation,
    bitmap: Option<&Bitmap>,
    data: &DataSection,
) -> Result<(), Grib2Error> {
    let invalid = |reason: String| Err(Grib2Error::InvalidFormat(reason));

    let points = u64::from(grid.ni) * u64::from(grid.nj);
    if points != u64::from(grid.num_data_points) {
        return invalid(format!(
            "Grid {}x{} does not match {} declared points",
            grid.ni, grid.nj, grid.num_data_points
        ));
    }
    if points > MAX_GRID_POINTS {
        return invalid(format!("Grid of {} points exceeds {}", points, MAX_GRID_POINTS));
    }

    let packed = u64::from(dr.num_data_points);
    match bitmap {
        Some(bm) => {
            if (bm.data.len() as u64) * 8 < points {
                return invalid(format!(
                    "Bitmap of {} bytes cannot cover {} points",
                    bm.data.len(),
                    points
                ));
            }
            if packed > points {
                return invalid(format!("{} packed values for {} points", packed, points));
            }
        }
        None if packed != points => {
            return invalid(format!("{} packed values for {} points", packed, points));
        }
        None => {}
    }

    if dr.template == SIMPLE_PACKING {
        let needed_bits = packed * u64::from(dr.bits_per_value);
        if (data.data.len() as u64) * 8 < needed_bits {
            return invalid(format!(
                "Data section of {} bytes holds fewer than {} values of {} bits",
                data.data.len(),
                packed,
                dr.bits_per_value
            ));
        }
    }

    Ok(())
}

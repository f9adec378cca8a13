//! GRIB2 parsing errors.

use forecast_common::DecodeCause;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("unsupported grid template 3.{0}")]
    UnsupportedGridTemplate(u16),

    #[error("unsupported scanning mode {0:#010b}")]
    UnsupportedScanningMode(u8),

    #[error("unpacking failed: {0}")]
    UnpackingError(String),
}

impl From<Grib2Error> for DecodeCause {
    fn from(err: Grib2Error) -> Self {
        match err {
            Grib2Error::InvalidFormat(_) | Grib2Error::InvalidSection { .. } => {
                DecodeCause::InvalidFormat(err.to_string())
            }
            Grib2Error::UnsupportedGridTemplate(_) | Grib2Error::UnsupportedScanningMode(_) => {
                DecodeCause::UnsupportedGrid(err.to_string())
            }
            Grib2Error::UnpackingError(msg) => DecodeCause::Unpack(msg),
        }
    }
}

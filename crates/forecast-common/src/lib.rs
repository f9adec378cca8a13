//! Common types shared across the forecast services.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod point;

pub use bbox::BoundingBox;
pub use error::{DecodeCause, DecodeError, ForecastError, ForecastResult};
pub use grid::{DecodedGrid, GridMetadata, StepUnits, SCANNING_MODE_J_POSITIVE};
pub use point::{normalize_longitude, QueryPoint};

//! HTTP request handlers.

pub mod bbox;
pub mod grib_data;
pub mod health;

//! GRIB2 decoding for forecast files (WMO FM 92 GRIB Edition 2).
//!
//! Only the first message of a file is read. Section parsing and simple
//! packing are handled here; other packings are handed to the `grib` crate.

pub mod decoder;
pub mod error;
pub mod message;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use decoder::{decode_bytes, GribFileDecoder, GridDecoder};
pub use error::Grib2Error;
pub use message::{first_message, Grib2Message};
pub use unpacking::unpack_simple;

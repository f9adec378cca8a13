//! Error types for forecast grid handling.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Why a forecast file could not be turned into a grid.
///
/// Causes are stored as strings so a failed decode can be cloned out of a
/// cache slot and handed to every caller that asks for the same file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeCause {
    #[error("file not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid GRIB data: {0}")]
    InvalidFormat(String),

    #[error("file contains no GRIB messages")]
    NoMessages,

    #[error("unsupported grid definition: {0}")]
    UnsupportedGrid(String),

    #[error("failed to unpack data: {0}")]
    Unpack(String),

    #[error("decode task failed: {0}")]
    Task(String),

    #[error("grid shape mismatch: expected {expected} points, {array} has {actual}")]
    ShapeMismatch {
        expected: usize,
        array: &'static str,
        actual: usize,
    },
}

/// A decode failure for one file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to decode {}: {cause}", .path.display())]
pub struct DecodeError {
    pub path: PathBuf,
    pub cause: DecodeCause,
}

impl DecodeError {
    pub fn new(path: impl AsRef<Path>, cause: DecodeCause) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cause,
        }
    }

    /// Build a decode error from an I/O failure, keeping "not found" distinct.
    pub fn from_io(path: impl AsRef<Path>, err: &std::io::Error) -> Self {
        let cause = if err.kind() == std::io::ErrorKind::NotFound {
            DecodeCause::NotFound
        } else {
            DecodeCause::Io(err.to_string())
        };
        Self::new(path, cause)
    }
}

/// Errors produced while turning a decoded grid into result records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unsupported step units: {0}")]
    UnsupportedStepUnits(u8),

    #[error("invalid step range: {0:?}")]
    InvalidStepRange(String),

    #[error("grid has no points with valid coordinates")]
    EmptyGrid,
}

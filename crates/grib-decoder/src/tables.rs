//! GRIB2 lookup tables.
//!
//! Translates (discipline, category, number) triples into the short names
//! used by ecCodes, and time-range unit codes into durations.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Short name reported for parameters missing from the table.
pub const UNKNOWN_SHORT_NAME: &str = "unknown";

/// GRIB2 parameter short-name table.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    parameters: HashMap<ParamKey, String>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables populated with the ecCodes short names of common forecast fields.
    pub fn standard() -> Self {
        let mut tables = Self::new();
        for &(discipline, category, number, name) in STANDARD_PARAMETERS {
            tables.add_parameter(discipline, category, number, name.to_string());
        }
        tables
    }

    /// Add or replace a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Look up the short name, falling back to "unknown" like ecCodes does.
    pub fn short_name(&self, discipline: u8, category: u8, number: u8) -> &str {
        self.parameters
            .get(&(discipline, category, number))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SHORT_NAME)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }
}

const STANDARD_PARAMETERS: &[(u8, u8, u8, &str)] = &[
    // Temperature
    (0, 0, 0, "t"),
    (0, 0, 2, "pt"),
    (0, 0, 4, "mx2t"),
    (0, 0, 5, "mn2t"),
    (0, 0, 6, "dpt"),
    // Moisture
    (0, 1, 0, "q"),
    (0, 1, 1, "r"),
    (0, 1, 3, "pwat"),
    (0, 1, 7, "prate"),
    (0, 1, 8, "tp"),
    (0, 1, 9, "lsp"),
    (0, 1, 10, "cp"),
    (0, 1, 11, "sde"),
    (0, 1, 29, "asnow"),
    (0, 1, 52, "tprate"),
    // Momentum
    (0, 2, 0, "wdir"),
    (0, 2, 1, "ws"),
    (0, 2, 2, "u"),
    (0, 2, 3, "v"),
    (0, 2, 8, "w"),
    (0, 2, 22, "gust"),
    // Mass
    (0, 3, 0, "sp"),
    (0, 3, 1, "prmsl"),
    (0, 3, 5, "gh"),
    // Radiation
    (0, 4, 7, "sdswrf"),
    // Cloud
    (0, 6, 1, "tcc"),
    (0, 6, 3, "lcc"),
    (0, 6, 4, "mcc"),
    (0, 6, 5, "hcc"),
    // Stability
    (0, 7, 6, "cape"),
    (0, 7, 7, "cin"),
    // Visibility
    (0, 19, 0, "vis"),
];

/// Seconds in one unit of GRIB2 code table 4.4, where the unit has a fixed length.
pub fn time_unit_seconds(code: u8) -> Option<i64> {
    match code {
        0 => Some(60),
        1 => Some(3_600),
        2 => Some(86_400),
        10 => Some(3 * 3_600),
        11 => Some(6 * 3_600),
        12 => Some(12 * 3_600),
        13 => Some(1),
        // Month, year, decade, ... have no fixed length
        _ => None,
    }
}

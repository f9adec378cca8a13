//! GRIB2 section parsing.
//!
//! Each parser takes the bytes of a single message (starting at the `GRIB`
//! magic) and locates its section by walking the section length headers.

use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Value used by GRIB2 for "missing" in 4-octet unsigned fields.
pub const MISSING_U32: u32 = u32::MAX;

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
}

/// Section 3: Grid Definition Section (template 3.0, regular lat/lon)
///
/// Coordinates are kept in microdegrees as encoded.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template: u16,
    /// Number of data points declared by section 3.
    pub num_data_points: u32,
    pub ni: u32,
    pub nj: u32,
    pub la1: i32,
    pub lo1: i32,
    pub la2: i32,
    pub lo2: i32,
    pub di: u32,
    pub dj: u32,
    pub scanning_mode: u8,
}

/// Statistical processing interval of templates 4.8 / 4.11.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub statistical_process: u8,
    pub unit: u8,
    pub length: u32,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    /// Indicator of unit of time range (code table 4.4)
    pub time_unit: u8,
    pub forecast_time: u32,
    pub level_type: u8,
    pub level_value: u32,
    /// Present for statistically processed (accumulated) products.
    pub time_range: Option<TimeRange>,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Decode a 4-octet GRIB2 sign-magnitude integer (MSB is the sign bit).
///
/// Returns 0 unless exactly four bytes are given.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a 2-octet GRIB2 sign-magnitude integer.
fn decode_grib2_signed_i16(bytes: &[u8]) -> i16 {
    let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, 7 discipline, 8 edition, 9-16 total length
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let section_offset = find_section(data, 1)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 19 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let center = u16::from_be_bytes([section_data[5], section_data[6]]);
    let sub_center = u16::from_be_bytes([section_data[7], section_data[8]]);
    let significance_of_reference_time = section_data[11];

    let year = u16::from_be_bytes([section_data[12], section_data[13]]);
    let month = section_data[14];
    let day = section_data[15];
    let hour = section_data[16];
    let minute = section_data[17];
    let second = section_data[18];

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section_offset = find_section(data, 3)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 13-14: grid definition template number; template data from octet 15
    let template = u16::from_be_bytes([section_data[12], section_data[13]]);
    if template != 0 {
        return Err(Grib2Error::UnsupportedGridTemplate(template));
    }

    let gd = &section_data[14..];
    if gd.len() < 58 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
        });
    }

    Ok(GridDefinition {
        template,
        num_data_points: read_u32(&section_data[6..10]),
        ni: read_u32(&gd[16..20]),
        nj: read_u32(&gd[20..24]),
        la1: decode_grib2_signed(&gd[32..36]),
        lo1: decode_grib2_signed(&gd[36..40]),
        la2: decode_grib2_signed(&gd[41..45]),
        lo2: decode_grib2_signed(&gd[45..49]),
        di: read_u32(&gd[49..53]),
        dj: read_u32(&gd[53..57]),
        scanning_mode: gd[57],
    })
}

/// Offset (within section 4) of the first time-range specification for
/// statistically processed templates.
fn time_range_offset(template: u16) -> Option<usize> {
    match template {
        // 4.8: 34 common octets + end-of-interval (7) + n (1) + missing (4)
        8 => Some(46),
        // 4.11: as 4.8 with three ensemble octets in front
        11 => Some(49),
        _ => None,
    }
}

/// Parse Section 4 (Product Definition)
///
/// Templates 4.0 through 4.15 share the first 34 octets; the statistical
/// time range is read for 4.8 and 4.11.
pub fn parse_product_definition(data: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    let section_offset = find_section(data, 4)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 34 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    let template = u16::from_be_bytes([section_data[7], section_data[8]]);
    let parameter_category = section_data[9];
    let parameter_number = section_data[10];
    let time_unit = section_data[17];
    let forecast_time = read_u32(&section_data[18..22]);
    let level_type = section_data[22];
    let level_value = read_u32(&section_data[24..28]);

    let time_range = match time_range_offset(template) {
        Some(offset) => {
            if section_data.len() < offset + 7 {
                return Err(Grib2Error::InvalidSection {
                    section: 4,
                    reason: format!("Template {} truncated before time range", template),
                });
            }
            Some(TimeRange {
                statistical_process: section_data[offset],
                unit: section_data[offset + 2],
                length: read_u32(&section_data[offset + 3..offset + 7]),
            })
        }
        None => None,
    };

    Ok(ProductDefinition {
        template,
        parameter_category,
        parameter_number,
        time_unit,
        forecast_time,
        level_type,
        level_value,
        time_range,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section_offset = find_section(data, 5)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9: number of data points, 10-11: template number.
    // For template 5.0: 12-15 reference value (IEEE float), 16-17 binary
    // scale, 18-19 decimal scale (both sign-magnitude), 20 bits per value.
    let num_data_points = read_u32(&section_data[5..9]);
    let template = u16::from_be_bytes([section_data[9], section_data[10]]);

    let template_data = &section_data[11..];
    let reference_value = if template_data.len() >= 4 {
        f32::from_be_bytes([
            template_data[0],
            template_data[1],
            template_data[2],
            template_data[3],
        ])
    } else {
        0.0
    };
    let binary_scale_factor = if template_data.len() >= 6 {
        decode_grib2_signed_i16(&template_data[4..6])
    } else {
        0
    };
    let decimal_scale_factor = if template_data.len() >= 8 {
        decode_grib2_signed_i16(&template_data[6..8])
    } else {
        0
    };
    let bits_per_value = template_data.get(8).copied().unwrap_or(0);

    Ok(DataRepresentation {
        num_data_points,
        template,
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value,
    })
}

/// Parse Section 6 (Bitmap). `None` when the message carries no bitmap.
pub fn parse_bitmap(data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let section_offset = find_section(data, 6)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    let section_length = read_u32(&section_data[0..4]) as usize;
    if section_length < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Section too short".to_string(),
        });
    }

    match section_data[5] {
        0 => Ok(Some(Bitmap {
            data: Bytes::copy_from_slice(&section_data[6..section_length]),
        })),
        255 => Ok(None),
        indicator => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Unsupported bitmap indicator {}", indicator),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let section_offset = find_section(data, 7)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 5 {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "Not enough data".to_string(),
        });
    }

    let section_length = read_u32(&section_data[0..4]) as usize;

    let data_bytes = if section_length > 5 {
        Bytes::copy_from_slice(&section_data[5..section_length])
    } else {
        Bytes::new()
    };

    Ok(DataSection { data: data_bytes })
}

// ===== Helper Functions =====

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 4 <= data.len() && &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Reached end of message without finding section".to_string(),
            });
        }

        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        let section_length = read_u32(&data[offset..offset + 4]) as usize;

        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}

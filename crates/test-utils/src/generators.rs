//! Test data generators: synthetic GRIB2 files and predictable value grids.

use std::io;
use std::path::Path;

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Sign-magnitude encoding used by GRIB2 for signed octets.
fn sign_magnitude_i32(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

fn sign_magnitude_i16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

fn microdegrees(degrees: f64) -> i32 {
    (degrees * 1e6).round() as i32
}

/// Builds a minimal single-message GRIB2 file on a regular lat/lon grid.
///
/// Values are simple-packed at 16 bits. NaN values are written as missing
/// through a bitmap.
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    reference_time: (u16, u8, u8, u8, u8),
    // Grid definition, in degrees
    ni: u32,
    nj: u32,
    first_lat: f64,
    first_lon: f64,
    di: f64,
    dj: f64,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    time_unit: u8,
    forecast_time: u32,
    /// (unit, length) of an accumulation interval (template 4.8)
    accumulation: Option<(u8, u32)>,
    data_values: Vec<f32>,
}

impl Default for Grib2Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Grib2Builder {
    /// 2 metre temperature on a 3x3 one-degree grid starting at 10N 0E,
    /// scanned north to south, analysis time 2024-01-01 00:00 UTC.
    pub fn new() -> Self {
        Self {
            discipline: 0,
            center: 98,
            reference_time: (2024, 1, 1, 0, 0),
            ni: 3,
            nj: 3,
            first_lat: 10.0,
            first_lon: 0.0,
            di: 1.0,
            dj: 1.0,
            scanning_mode: 0,
            param_category: 0,
            param_number: 0,
            level_type: 103,
            level_value: 2,
            time_unit: 1,
            forecast_time: 0,
            accumulation: None,
            data_values: vec![288.15; 9],
        }
    }

    /// Total precipitation accumulated over `length` units after the forecast time.
    pub fn precipitation(forecast_time: u32, unit: u8, length: u32) -> Self {
        Self::new()
            .with_parameter(1, 8)
            .with_level(1, 0)
            .with_forecast_time(unit, forecast_time)
            .with_accumulation(unit, length)
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8, minute: u8) -> Self {
        self.reference_time = (year, month, day, hour, minute);
        self
    }

    /// Resize the grid; values are reset to `create_test_grid`.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = create_test_grid(ni as usize, nj as usize);
        self
    }

    /// First grid point and increments, in degrees.
    pub fn with_origin(mut self, first_lat: f64, first_lon: f64, dj: f64, di: f64) -> Self {
        self.first_lat = first_lat;
        self.first_lon = first_lon;
        self.dj = dj;
        self.di = di;
        self
    }

    pub fn with_scanning_mode(mut self, scanning_mode: u8) -> Self {
        self.scanning_mode = scanning_mode;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    /// Forecast time in units of code table 4.4 (0 = minute, 1 = hour).
    pub fn with_forecast_time(mut self, unit: u8, forecast_time: u32) -> Self {
        self.time_unit = unit;
        self.forecast_time = forecast_time;
        self
    }

    /// Write product template 4.8 with one time range of `length` units.
    pub fn with_accumulation(mut self, unit: u8, length: u32) -> Self {
        self.accumulation = Some((unit, length));
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        for section in &sections {
            message.extend_from_slice(section);
        }
        message.extend_from_slice(b"7777");

        message
    }

    /// Build and write the message to `path`.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    fn has_missing(&self) -> bool {
        self.data_values.iter().any(|v| v.is_nan())
    }

    fn present_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data_values.iter().copied().filter(|v| !v.is_nan())
    }

    /// (reference value, binary scale factor, bits per value)
    fn packing_parameters(&self) -> (f32, i16, u8) {
        let (min_val, max_val) = self
            .present_values()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| {
                (min.min(v), max.max(v))
            });

        if !min_val.is_finite() {
            return (0.0, 0, 0);
        }

        let range = max_val - min_val;
        if range == 0.0 {
            return (min_val, 0, 0);
        }

        // value = reference + packed * 2^E, packed fits in 16 bits
        let binary_scale_factor = (range / 65535.0).log2().ceil() as i16;
        (min_val, binary_scale_factor, 16)
    }

    fn build_section1(&self) -> Vec<u8> {
        let (year, month, day, hour, minute) = self.reference_time;
        let mut section = Vec::new();

        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);
        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Significance of reference time (start of forecast)
        section.extend_from_slice(&year.to_be_bytes());
        section.push(month);
        section.push(day);
        section.push(hour);
        section.push(minute);
        section.push(0); // Second
        section.push(0); // Production status
        section.push(1); // Type of data (forecast)

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();

        let j_sign = if self.scanning_mode & 0x40 != 0 { 1.0 } else { -1.0 };
        let i_sign = if self.scanning_mode & 0x80 != 0 { -1.0 } else { 1.0 };
        let last_lat = self.first_lat + j_sign * self.dj * (self.nj.max(1) - 1) as f64;
        let last_lon = self.first_lon + i_sign * self.di * (self.ni.max(1) - 1) as f64;

        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3);
        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions
        section.extend_from_slice(&sign_magnitude_i32(microdegrees(self.first_lat)));
        section.extend_from_slice(&sign_magnitude_i32(microdegrees(self.first_lon)));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&sign_magnitude_i32(microdegrees(last_lat)));
        section.extend_from_slice(&sign_magnitude_i32(microdegrees(last_lon)));
        section.extend_from_slice(&(microdegrees(self.di) as u32).to_be_bytes());
        section.extend_from_slice(&(microdegrees(self.dj) as u32).to_be_bytes());
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        let (template, length): (u16, u32) = match self.accumulation {
            Some(_) => (8, 58),
            None => (0, 34),
        };

        section.extend_from_slice(&length.to_be_bytes());
        section.push(4);
        section.extend_from_slice(&0u16.to_be_bytes()); // Coordinate values
        section.extend_from_slice(&template.to_be_bytes());

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Type of generating process (forecast)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(self.time_unit);
        section.extend_from_slice(&self.forecast_time.to_be_bytes());
        section.push(self.level_type);
        section.push(0);
        section.extend_from_slice(&self.level_value.to_be_bytes());
        section.push(255); // No second fixed surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        if let Some((unit, range_length)) = self.accumulation {
            // End of overall time interval (not interpreted by the decoder)
            let (year, month, day, hour, minute) = self.reference_time;
            section.extend_from_slice(&year.to_be_bytes());
            section.extend_from_slice(&[month, day, hour, minute, 0]);
            section.push(1); // Number of time ranges
            section.extend_from_slice(&0u32.to_be_bytes()); // Missing values
            section.push(1); // Statistical process: accumulation
            section.push(2); // Type of time increment
            section.push(unit);
            section.extend_from_slice(&range_length.to_be_bytes());
            section.push(255); // Increment unit
            section.extend_from_slice(&0u32.to_be_bytes());
        }

        section
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_parameters();
        let num_data_points = self.present_values().count() as u32;

        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);
        section.extend_from_slice(&num_data_points.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0
        section.extend_from_slice(&reference_value.to_be_bytes());
        section.extend_from_slice(&sign_magnitude_i16(binary_scale_factor));
        section.extend_from_slice(&sign_magnitude_i16(0)); // Decimal scale factor
        section.push(bits_per_value);
        section.push(0); // Original field type (floating point)

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        if !self.has_missing() {
            let mut section = 6u32.to_be_bytes().to_vec();
            section.push(6);
            section.push(255); // No bitmap
            return section;
        }

        let mut bitmap = vec![0u8; self.data_values.len().div_ceil(8)];
        for (i, value) in self.data_values.iter().enumerate() {
            if !value.is_nan() {
                bitmap[i / 8] |= 0x80 >> (i % 8);
            }
        }

        let mut section = ((6 + bitmap.len()) as u32).to_be_bytes().to_vec();
        section.push(6);
        section.push(0); // Bitmap follows
        section.extend_from_slice(&bitmap);
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let packed = self.pack_simple();

        let mut section = ((5 + packed.len()) as u32).to_be_bytes().to_vec();
        section.push(7);
        section.extend_from_slice(&packed);
        section
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_parameters();
        if bits_per_value == 0 {
            return Vec::new();
        }

        let binary_scale = 2.0_f32.powi(binary_scale_factor as i32);
        self.present_values()
            .flat_map(|v| {
                let packed = ((v - reference_value) / binary_scale).round() as u16;
                packed.to_be_bytes()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_framing() {
        let data = Grib2Builder::new().build();

        assert_eq!(&data[0..4], b"GRIB");
        assert_eq!(data[7], 2);
        assert_eq!(&data[data.len() - 4..], b"7777");

        let length = u64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(length as usize, data.len());
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(sign_magnitude_i32(-1), [0x80, 0, 0, 1]);
        assert_eq!(sign_magnitude_i32(5), [0, 0, 0, 5]);
        assert_eq!(sign_magnitude_i16(-3), [0x80, 3]);
    }

    #[test]
    fn test_accumulation_uses_template_4_8() {
        let plain = Grib2Builder::new().build();
        let accumulated = Grib2Builder::precipitation(0, 1, 6).build();

        assert_eq!(accumulated.len(), plain.len() + 24);
    }

    #[test]
    fn test_missing_values_add_bitmap() {
        let data = Grib2Builder::new()
            .with_grid(2, 2)
            .with_data(vec![1.0, f32::NAN, 3.0, 4.0])
            .build();
        let without = Grib2Builder::new()
            .with_grid(2, 2)
            .with_data(vec![1.0, 2.0, 3.0, 4.0])
            .build();

        // One bitmap octet, one fewer 16-bit packed value
        assert_eq!(data.len(), without.len() + 1 - 2);
    }
}

//! GRIB2 data unpacking.
//!
//! Simple packing (template 5.0) is unpacked here. Other packings are
//! decoded through the `grib` crate by [`crate::Grib2Message::unpack_data`].

use crate::Grib2Error;

/// Unpack simple packed GRIB2 data
///
/// value = (reference_value + packed_value * 2^binary_scale) * 10^(-decimal_scale)
///
/// Points switched off in the bitmap come back as NaN.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: u32,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>, Grib2Error> {
    let binary_scale = 2.0_f32.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f32.powi(-(decimal_scale_factor as i32));
    let bits_per_value = bits_per_value as usize;

    let mut values = Vec::with_capacity(num_points as usize);
    let mut bit_position = 0;

    for i in 0..(num_points as usize) {
        // Bitmap: 1 bit per data point, 1 = value present
        let has_value = match bitmap {
            Some(bm) => bm
                .get(i / 8)
                .map(|byte| (byte >> (7 - (i % 8))) & 1 == 1)
                .unwrap_or(true),
            None => true,
        };

        if !has_value {
            values.push(f32::NAN);
            continue;
        }

        let packed_value = if bits_per_value == 0 {
            0
        } else {
            let v = extract_bits(packed_data, bit_position, bits_per_value)
                .map_err(|e| Grib2Error::UnpackingError(format!("Failed to extract bits: {}", e)))?;
            bit_position += bits_per_value;
            v
        };

        values.push((reference_value + (packed_value as f32) * binary_scale) * decimal_scale);
    }

    Ok(values)
}

/// Extract bits from a byte array, MSB first
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8);

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

//! GRIB2 data unpacking algorithms.
//!
//! Complex/JPEG2000/PNG-packed templates are delegated to the external
//! `grib` crate via [`crate::Grib2Message::unpack_data`]. This module holds
//! the simple-packing algorithm (Template 5.0) directly, since it is a
//! handful of lines of bit-reading arithmetic and does not justify a
//! dependency for data this crate already parses.

use crate::sections::DataRepresentation;
use crate::{Grib2Error, Grib2Result};

/// Unpack Template 5.0 (grid point data, simple packing) values.
///
/// Each packed value `X` decodes to:
/// `Y = (reference_value + X * 2^binary_scale_factor) / 10^decimal_scale_factor`
///
/// `packed` is the raw Section 7 data, read as a bitstream of
/// `data_rep.bits_per_value`-bit big-endian unsigned integers. A
/// `bits_per_value` of 0 means every point takes the constant
/// `reference_value`.
pub fn unpack_simple(packed: &[u8], data_rep: &DataRepresentation) -> Grib2Result<Vec<f32>> {
    let n = data_rep.num_data_points as usize;
    let bits = data_rep.bits_per_value as usize;
    let decimal_scale = 10f64.powi(data_rep.decimal_scale_factor as i32);
    let binary_scale = 2f64.powi(data_rep.binary_scale_factor as i32);
    let reference = data_rep.reference_value as f64;

    if bits == 0 {
        let value = (reference / decimal_scale) as f32;
        return Ok(vec![value; n]);
    }

    let total_bits = n
        .checked_mul(bits)
        .ok_or_else(|| Grib2Error::UnpackingError("bit count overflow".to_string()))?;
    let required_bytes = total_bits.div_ceil(8);
    if packed.len() < required_bytes {
        return Err(Grib2Error::UnpackingError(format!(
            "simple-packed data section too short: have {} bytes, need {}",
            packed.len(),
            required_bytes
        )));
    }

    let mut values = Vec::with_capacity(n);
    let mut bit_offset = 0usize;
    for _ in 0..n {
        let raw = read_bits(packed, bit_offset, bits);
        bit_offset += bits;
        let unpacked = (reference + raw as f64 * binary_scale) / decimal_scale;
        values.push(unpacked as f32);
    }

    Ok(values)
}

/// Read `bits` (<= 32) bits starting at `bit_offset` from a big-endian
/// bitstream, returned right-aligned in a `u32`.
fn read_bits(data: &[u8], bit_offset: usize, bits: usize) -> u32 {
    let mut result: u32 = 0;
    for i in 0..bits {
        let bit_index = bit_offset + i;
        let byte_index = bit_index / 8;
        let bit_in_byte = 7 - (bit_index % 8);
        let bit = (data[byte_index] >> bit_in_byte) & 1;
        result = (result << 1) | bit as u32;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_rep(bits: u8, reference: f32, binary_scale: i16, decimal_scale: i16, n: u32) -> DataRepresentation {
        DataRepresentation {
            num_data_points: n,
            packing_method: 0,
            original_data_type: 0,
            reference_value: reference,
            binary_scale_factor: binary_scale,
            decimal_scale_factor: decimal_scale,
            bits_per_value: bits,
        }
    }

    #[test]
    fn unpacks_constant_field_when_zero_bits() {
        let rep = data_rep(0, 50.0, 0, 1, 4);
        let values = unpack_simple(&[], &rep).unwrap();
        assert_eq!(values, vec![5.0; 4]);
    }

    #[test]
    fn unpacks_8_bit_values() {
        // reference=0, binary_scale=0, decimal_scale=0, bits=8: raw bytes map 1:1
        let rep = data_rep(8, 0.0, 0, 0, 3);
        let packed = [10u8, 20, 30];
        let values = unpack_simple(&packed, &rep).unwrap();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn unpacks_sub_byte_bit_widths() {
        // 4-bit values packed two per byte: 0x12 = [1, 2]
        let rep = data_rep(4, 0.0, 0, 0, 2);
        let packed = [0x12u8];
        let values = unpack_simple(&packed, &rep).unwrap();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn applies_binary_and_decimal_scale_factors() {
        // Y = (reference + X * 2^binary_scale) / 10^decimal_scale
        let rep = data_rep(8, 100.0, 1, 1, 1);
        let packed = [4u8]; // X = 4
        let values = unpack_simple(&packed, &rep).unwrap();
        // (100 + 4*2) / 10 = 10.8
        assert!((values[0] - 10.8).abs() < 1e-4);
    }

    #[test]
    fn rejects_truncated_data_section() {
        let rep = data_rep(16, 0.0, 0, 0, 10);
        let err = unpack_simple(&[0u8; 4], &rep).unwrap_err();
        assert!(matches!(err, Grib2Error::UnpackingError(_)));
    }
}

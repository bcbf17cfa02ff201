//! Shared integration-test scaffolding: a minimal synthetic GRIB2 message
//! builder, grounded in `grib-reader`'s own `tests/testdata_generator.rs`
//! and reproduced here since `tests/` binaries cannot depend on each other
//! across crates.

/// Builds one minimal, valid GRIB2 message for a single surface field on a
/// small lat/lon grid. Good enough for `grib_reader::Grib2Reader` to decode
/// and for `services/forecast-pipeline`'s fetcher to recognize by parameter
/// short name (see `get_parameter_short_name` in `grib-reader`).
pub struct Grib2Builder {
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    ni: u32,
    nj: u32,
    data_values: Vec<f32>,
}

impl Grib2Builder {
    /// TMP 2m above ground, on a small 4x4 grid covering the PNW test region.
    pub fn tmp2m(forecast_hour: u32) -> Self {
        Self {
            param_category: 0,
            param_number: 0,
            level_type: 103,
            level_value: 2,
            forecast_hour,
            ni: 4,
            nj: 4,
            data_values: vec![285.0; 16],
        }
    }

    /// APCP (total precipitation), surface.
    pub fn apcp(forecast_hour: u32) -> Self {
        Self {
            param_category: 1,
            param_number: 8,
            level_type: 1,
            level_value: 0,
            forecast_hour,
            ni: 4,
            nj: 4,
            data_values: vec![2.0; 16],
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut message = Vec::new();

        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let section5 = self.build_section5();
        let section6 = self.build_section6();
        let section7 = self.build_section7();

        let message_length = 16
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4;

        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(0); // discipline: meteorological
        message.push(2); // edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        message.extend_from_slice(&section1);
        message.extend_from_slice(&section3);
        message.extend_from_slice(&section4);
        message.extend_from_slice(&section5);
        message.extend_from_slice(&section6);
        message.extend_from_slice(&section7);

        message.extend_from_slice(b"7777");
        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);
        section.extend_from_slice(&7u16.to_be_bytes()); // center: NCEP
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(2);
        section.push(1);
        section.push(1);
        section.extend_from_slice(&2026u16.to_be_bytes());
        section.push(2);
        section.push(1);
        section.push(6);
        section.push(0);
        section.push(0);
        section.push(0);
        section.push(1);
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let template_data_len = 58u32;
        section.extend_from_slice(&(14 + template_data_len).to_be_bytes());
        section.push(3);
        section.push(0);
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes());

        section.push(6);
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes());
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes());

        // PNW test tile: 50N..45N, -125..-120 (microdegrees).
        section.extend_from_slice(&50_000_000i32.to_be_bytes());
        section.extend_from_slice(&235_000_000i32.to_be_bytes());
        section.push(48);
        section.extend_from_slice(&45_000_000i32.to_be_bytes());
        section.extend_from_slice(&240_000_000i32.to_be_bytes());
        section.extend_from_slice(&1_000_000u32.to_be_bytes());
        section.extend_from_slice(&1_000_000u32.to_be_bytes());
        section.push(0b01000000);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4);
        section.extend_from_slice(&0u16.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2);
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(0);
        section.push(1);
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());
        section.push(self.level_type);
        section.push(0);
        section.extend_from_slice(&self.level_value.to_be_bytes());
        section.push(255);
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section
    }

    fn range(&self) -> (f32, f32) {
        self.data_values.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
    }

    fn binary_scale_factor(&self) -> i16 {
        let (min_val, max_val) = self.range();
        let range = max_val - min_val;
        if range == 0.0 {
            0
        } else {
            (range / 65535.0).log2().ceil() as i16
        }
    }

    fn build_section5(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let (min_val, max_val) = self.range();
        let range = max_val - min_val;
        let bits_per_value: u8 = if range == 0.0 { 0 } else { 16 };

        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes());
        section.extend_from_slice(&min_val.to_be_bytes());
        section.extend_from_slice(&self.binary_scale_factor().to_be_bytes());
        section.extend_from_slice(&0i16.to_be_bytes());
        section.push(bits_per_value);
        section.push(0);
        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&6u32.to_be_bytes());
        section.push(6);
        section.push(255);
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let packed = self.pack_simple();
        section.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed);
        section
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (min_val, max_val) = self.range();
        let range = max_val - min_val;
        if range == 0.0 {
            return Vec::new();
        }
        let scale = 2.0_f32.powi(self.binary_scale_factor() as i32);
        let mut packed = Vec::new();
        for &val in &self.data_values {
            let packed_value = ((val - min_val) / scale).round() as u16;
            packed.extend_from_slice(&packed_value.to_be_bytes());
        }
        packed
    }
}

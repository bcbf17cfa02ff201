//! Test data generators for creating synthetic weather-like data.
//!
//! These generators create predictable, verifiable test data patterns that
//! can be used across the test suite, and helpers to wrap them in the
//! workspace's `GridDataset` contract.

use pnw_common::{Coordinates, GridDataset};

use crate::fixtures::grid::GridSpec;

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as `col * 1000 + row`, making it easy to
/// verify that data is being read/written correctly.
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a test grid with temperature-like values in Kelvin.
///
/// Values range from approximately 250K (-23C) to 310K (37C), a gradient
/// from cold (top-left) to warm (bottom-right).
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            let temp = 250.0 + (x_factor * 30.0) + (y_factor * 30.0);
            data.push(temp);
        }
    }
    data
}

/// Creates a U-component wind grid (west-east component, m/s).
pub fn create_u_wind_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for _col in 0..width {
            let lat_factor = (row as f32 / height as f32 - 0.5) * 2.0;
            data.push(lat_factor * 20.0);
        }
    }
    data
}

/// Creates a V-component wind grid (south-north component, m/s).
pub fn create_v_wind_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            let lon_factor = (col as f32 / width as f32 - 0.5) * 2.0;
            data.push(lon_factor * 15.0);
        }
    }
    data
}

/// Creates a grid of mean sea level pressure values in Pa, centered near a
/// standard 101325 Pa with a gentle gradient.
pub fn create_mslp_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32 - 0.5;
            let y_factor = row as f32 / height.max(1) as f32 - 0.5;
            data.push(101_325.0 + (x_factor + y_factor) * 1_500.0);
        }
    }
    data
}

/// Creates a grid with deterministic, reproducible precipitation values
/// (liquid-equivalent mm).
///
/// Most values are 0 (no precip); a deterministic hash picks the rest, up
/// to 50mm.
pub fn create_precipitation_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            let precip = if hash % 4 == 0 {
                (hash % 5000) as f32 / 100.0
            } else {
                0.0
            };
            data.push(precip);
        }
    }
    data
}

/// Creates a snow-fraction mask (0.0-1.0), deterministic from `seed`.
pub fn create_snow_fraction_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed.wrapping_add(7));
            data.push((hash % 100) as f32 / 100.0);
        }
    }
    data
}

/// Creates a composite reflectivity grid in dBZ, deterministic from `seed`.
pub fn create_reflectivity_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed.wrapping_add(13));
            let dbz = if hash % 5 == 0 {
                (hash % 6000) as f32 / 100.0
            } else {
                -20.0 // below detection threshold
            };
            data.push(dbz);
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specified positions, zeros elsewhere.
///
/// Useful for testing missing-data handling.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Creates RGBA pixel data for a simple gradient test pattern, useful for
/// testing PNG encoding.
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}

/// Builds a `GridDataset` on a regular lat/lon grid from a `GridSpec`,
/// inserting one variable generated by `fill`.
pub fn grid_dataset_with_variable(
    spec: &GridSpec,
    variable_name: &str,
    unit: &str,
    fill: impl Fn(usize, usize) -> Vec<f32>,
) -> GridDataset {
    let coordinates = Coordinates::RegularLatLon {
        lats: spec.lats(),
        lons: spec.lons(),
    };
    let mut dataset = GridDataset::new(coordinates);
    let values = fill(spec.width, spec.height);
    dataset
        .insert_variable(variable_name, values, Some(unit.to_string()))
        .expect("generator produced a correctly sized grid");
    dataset
}

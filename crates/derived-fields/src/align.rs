//! Grid alignment: interpolating a variable living on one grid onto another.
//!
//! Used when combining a pressure-level product and a surface product for
//! one composite variable, and their native grids differ in resolution.

use pnw_common::{Coordinates, GridDataset, GridError};
use projection::{bilinear_sample, lat_lon_to_index};

/// Resample `values` (on `source.coordinates`, a regular lat/lon grid) onto
/// `target.coordinates` (also regular lat/lon) via bilinear interpolation.
///
/// Returns `None` for a target point falling outside the source grid's
/// coverage, which callers should treat as a gap to interpolate around or
/// propagate as a region mismatch if it affects the whole grid.
pub fn resample_regular_lat_lon(
    values: &[f32],
    source: &Coordinates,
    target: &Coordinates,
) -> Result<Vec<f32>, GridError> {
    let (Coordinates::RegularLatLon { lats: src_lats, lons: src_lons }, Coordinates::RegularLatLon { lats: dst_lats, lons: dst_lons }) =
        (source, target)
    else {
        return Err(GridError::VariableSizeMismatch {
            expected: target.len(),
            actual: values.len(),
        });
    };

    let nx = src_lons.len();
    let ny = src_lats.len();
    let mut out = Vec::with_capacity(dst_lats.len() * dst_lons.len());

    for &lat in dst_lats {
        for &lon in dst_lons {
            let value = lat_lon_to_index(src_lats, src_lons, lat, lon)
                .and_then(|(x, y)| bilinear_sample(values, nx, ny, x, y))
                .unwrap_or(f32::NAN);
            out.push(value);
        }
    }

    Ok(out)
}

/// Align every variable of `source` onto `target`'s coordinate grid,
/// returning a new dataset on `target`'s grid. Variables already present on
/// `target` are left untouched; only `source`'s variables are resampled.
pub fn align_onto(source: &GridDataset, target: &GridDataset) -> Result<GridDataset, GridError> {
    let mut aligned = GridDataset::new(target.coordinates.clone());
    for (name, values) in &source.variables {
        let resampled = resample_regular_lat_lon(values, &source.coordinates, &target.coordinates)?;
        aligned.insert_variable(name.clone(), resampled, source.unit_of(name).map(String::from))?;
    }
    Ok(aligned)
}

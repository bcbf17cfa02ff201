//! Regular lat/lon grid lookup and simple interpolation helpers.
//!
//! Used by grid alignment (resampling one model's grid onto another's for a
//! composite variable) and by the projected-rectilinear/curvilinear station
//! samplers, which need a point-in-grid value without a full projection.

/// Bilinear-interpolate a value out of a row-major `nx x ny` grid at
/// fractional index `(x, y)`. Returns `None` if `(x, y)` falls outside the
/// grid's index range.
pub fn bilinear_sample(values: &[f32], nx: usize, ny: usize, x: f64, y: f64) -> Option<f32> {
    if nx == 0 || ny == 0 || x < 0.0 || y < 0.0 {
        return None;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    if x0 + 1 >= nx || y0 + 1 >= ny {
        // Fall back to nearest point at the edge rather than rejecting
        // outright, since fractional indices routinely land exactly on the
        // last row/column.
        let xi = x.round().clamp(0.0, (nx - 1) as f64) as usize;
        let yi = y.round().clamp(0.0, (ny - 1) as f64) as usize;
        return values.get(yi * nx + xi).copied();
    }

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let v00 = *values.get(y0 * nx + x0)?;
    let v10 = *values.get(y0 * nx + x0 + 1)?;
    let v01 = *values.get((y0 + 1) * nx + x0)?;
    let v11 = *values.get((y0 + 1) * nx + x0 + 1)?;

    let top = v00 as f64 * (1.0 - fx) + v10 as f64 * fx;
    let bottom = v01 as f64 * (1.0 - fx) + v11 as f64 * fx;
    Some((top * (1.0 - fy) + bottom * fy) as f32)
}

/// Nearest-neighbor sample out of a row-major `nx x ny` grid at fractional
/// index `(x, y)`.
pub fn nearest_sample(values: &[f32], nx: usize, ny: usize, x: f64, y: f64) -> Option<f32> {
    if nx == 0 || ny == 0 {
        return None;
    }
    let xi = x.round().clamp(0.0, (nx - 1) as f64) as usize;
    let yi = y.round().clamp(0.0, (ny - 1) as f64) as usize;
    values.get(yi * nx + xi).copied()
}

/// Convert a geographic coordinate to fractional grid indices on a regular
/// lat/lon grid whose axes are given explicitly (may be ascending or
/// descending).
pub fn lat_lon_to_index(lats: &[f64], lons: &[f64], lat: f64, lon: f64) -> Option<(f64, f64)> {
    let x = axis_fractional_index(lons, lon)?;
    let y = axis_fractional_index(lats, lat)?;
    Some((x, y))
}

fn axis_fractional_index(axis: &[f64], value: f64) -> Option<f64> {
    if axis.len() < 2 {
        return None;
    }
    let step = axis[1] - axis[0];
    if step == 0.0 {
        return None;
    }
    let idx = (value - axis[0]) / step;
    if idx < 0.0 || idx > (axis.len() - 1) as f64 {
        return None;
    }
    Some(idx)
}

/// Brute-force nearest-neighbor search over a small candidate set, the
/// strategy used for curvilinear-grid station sampling where the point
/// count is too small (a decimated candidate set, not every grid cell) to
/// justify a spatial index.
pub fn nearest_neighbor_index(points: &[(f64, f64)], target: (f64, f64)) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(lat, lon))| {
            let dlat = lat - target.0;
            let dlon = lon - target.1;
            (i, dlat * dlat + dlon * dlon)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
}

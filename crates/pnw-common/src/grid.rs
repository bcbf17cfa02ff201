//! Grid specifications and the `GridDataset` cross-component contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::BoundingBox;

/// Specification of a regular lat/lon or projected grid, used by the GRIB
/// section parser to locate a raw data value by row/column index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of points in X (longitude) direction
    pub nx: usize,
    /// Number of points in Y (latitude) direction
    pub ny: usize,
    /// Grid resolution in X direction (degrees or meters depending on CRS)
    pub dx: f64,
    /// Grid resolution in Y direction
    pub dy: f64,
    /// First grid point longitude/X
    pub first_x: f64,
    /// First grid point latitude/Y
    pub first_y: f64,
    /// Scan mode flags (determines how data is ordered)
    pub scan_mode: ScanMode,
}

impl GridSpec {
    pub fn new(
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        first_x: f64,
        first_y: f64,
        scan_mode: ScanMode,
    ) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            first_x,
            first_y,
            scan_mode,
        }
    }

    /// Calculate the bounding box of this grid.
    pub fn bbox(&self) -> BoundingBox {
        let last_x = self.first_x + (self.nx - 1) as f64 * self.dx;
        let last_y = self.first_y + (self.ny - 1) as f64 * self.dy;

        BoundingBox {
            min_x: self.first_x.min(last_x),
            min_y: self.first_y.min(last_y),
            max_x: self.first_x.max(last_x),
            max_y: self.first_y.max(last_y),
        }
    }

    /// Convert a grid index to coordinates.
    pub fn index_to_coord(&self, i: usize, j: usize) -> Option<GridPoint> {
        if i >= self.nx || j >= self.ny {
            return None;
        }

        let (i_eff, j_eff) = self.scan_mode.adjust_indices(i, j, self.nx, self.ny);

        Some(GridPoint {
            x: self.first_x + i_eff as f64 * self.dx,
            y: self.first_y + j_eff as f64 * self.dy,
            i,
            j,
        })
    }

    /// Convert coordinates to the nearest grid index.
    pub fn coord_to_index(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let i_f = (x - self.first_x) / self.dx;
        let j_f = (y - self.first_y) / self.dy;

        let i = i_f.round() as isize;
        let j = j_f.round() as isize;

        if i < 0 || j < 0 || i >= self.nx as isize || j >= self.ny as isize {
            return None;
        }

        Some((i as usize, j as usize))
    }

    /// Get the 1D array index for a 2D grid position.
    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        self.scan_mode.flat_index(i, j, self.nx, self.ny)
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }
}

/// A point on the grid with both indices and coordinates.
#[derive(Debug, Clone, Copy)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
    pub i: usize,
    pub j: usize,
}

/// Scan mode flags for grid data ordering, per GRIB2 Flag Table 3.4.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanMode {
    /// +i direction: false = +x (east), true = -x (west)
    pub i_negative: bool,
    /// +j direction: false = -y (south), true = +y (north)
    pub j_positive: bool,
    /// Adjacent points: false = i direction, true = j direction
    pub j_consecutive: bool,
    /// Row scan direction alternates
    pub alternating_rows: bool,
}

impl ScanMode {
    /// Most common mode: data starts at top-left, rows go west to east,
    /// columns go north to south.
    pub fn standard() -> Self {
        Self {
            i_negative: false,
            j_positive: false,
            j_consecutive: false,
            alternating_rows: false,
        }
    }

    pub fn from_grib2_flag(flag: u8) -> Self {
        Self {
            i_negative: (flag & 0x80) != 0,
            j_positive: (flag & 0x40) != 0,
            j_consecutive: (flag & 0x20) != 0,
            alternating_rows: (flag & 0x10) != 0,
        }
    }

    pub fn adjust_indices(&self, i: usize, j: usize, nx: usize, ny: usize) -> (usize, usize) {
        let i_adj = if self.i_negative { nx - 1 - i } else { i };
        let j_adj = if self.j_positive { j } else { ny - 1 - j };
        (i_adj, j_adj)
    }

    pub fn flat_index(&self, i: usize, j: usize, nx: usize, _ny: usize) -> usize {
        if self.j_consecutive {
            i * _ny + j
        } else {
            j * nx + i
        }
    }
}

/// Common grid definitions, used by tests and by model configs that want a
/// named starting point rather than spelling out every field in YAML.
pub mod grids {
    use super::*;

    /// GFS 0.25° global grid
    pub fn gfs_0p25() -> GridSpec {
        GridSpec::new(1440, 721, 0.25, -0.25, 0.0, 90.0, ScanMode::standard())
    }

    /// GFS 0.5° global grid
    pub fn gfs_0p50() -> GridSpec {
        GridSpec::new(720, 361, 0.5, -0.5, 0.0, 90.0, ScanMode::standard())
    }

    /// HRRR CONUS grid (3km Lambert Conformal)
    pub fn hrrr_conus() -> GridSpec {
        GridSpec::new(
            1799,
            1059,
            3000.0,
            3000.0,
            -2697568.0,
            -1587306.0,
            ScanMode {
                i_negative: false,
                j_positive: true,
                j_consecutive: false,
                alternating_rows: false,
            },
        )
    }
}

/// Lambert Conformal Conic parameters in their raw GRIB2 degree/meter form.
///
/// Kept here (rather than in `crates/projection`, which depends on this
/// crate) so a `GridDataset` can carry a concrete, serializable projection
/// descriptor without a dependency cycle; `crates/projection` builds its
/// `LambertConformal` transform from these fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LambertParams {
    pub lat1_deg: f64,
    pub lon1_deg: f64,
    pub lov_deg: f64,
    pub latin1_deg: f64,
    pub latin2_deg: f64,
    pub dx_m: f64,
    pub dy_m: f64,
    pub earth_radius_m: f64,
}

/// The coordinate shape of a `GridDataset`, per the spec's three supported
/// coordinate invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Coordinates {
    /// Regular lat/lon grid: 1D latitude and 1D longitude axes.
    RegularLatLon { lats: Vec<f64>, lons: Vec<f64> },
    /// Projected rectilinear grid: 1D x/y axes plus the projection that maps
    /// them to geographic coordinates.
    ProjectedXY {
        xs: Vec<f64>,
        ys: Vec<f64>,
        projection: LambertParams,
    },
    /// Curvilinear grid: 2D latitude/longitude fields, row-major, `ny x nx`.
    Curvilinear {
        lats: Vec<f64>,
        lons: Vec<f64>,
        nx: usize,
        ny: usize,
    },
}

impl Coordinates {
    /// `(ny, nx)` shape implied by this coordinate system.
    pub fn dims(&self) -> (usize, usize) {
        match self {
            Coordinates::RegularLatLon { lats, lons } => (lats.len(), lons.len()),
            Coordinates::ProjectedXY { xs, ys, .. } => (ys.len(), xs.len()),
            Coordinates::Curvilinear { nx, ny, .. } => (*ny, *nx),
        }
    }

    pub fn len(&self) -> usize {
        let (ny, nx) = self.dims();
        ny * nx
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize longitudes in place to `[-180, 180]`, west-negative.
    pub fn normalize_longitudes(&mut self) {
        let normalize = |lon: &mut f64| {
            while *lon > 180.0 {
                *lon -= 360.0;
            }
            while *lon < -180.0 {
                *lon += 360.0;
            }
        };
        match self {
            Coordinates::RegularLatLon { lons, .. } => lons.iter_mut().for_each(normalize),
            Coordinates::Curvilinear { lons, .. } => lons.iter_mut().for_each(normalize),
            Coordinates::ProjectedXY { .. } => {}
        }
    }
}

/// An in-memory labeled N-D grid: a fixed coordinate system plus a set of
/// named 2D variable fields sharing that shape.
///
/// This is the cross-component contract between the Data Fetcher, the
/// Derived-Field Layer, and the Map Generator: no component holds onto a
/// dynamically-typed attribute bag, only this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDataset {
    pub coordinates: Coordinates,
    /// Row-major `ny x nx` values per variable name.
    pub variables: HashMap<String, Vec<f32>>,
    /// Units per variable name, used by unit-sensitive derived-field logic
    /// (e.g. distinguishing a percent snow-probability field from a
    /// fractional one).
    pub units: HashMap<String, String>,
    /// Which upstream provider actually served this data, set by the
    /// fetcher after a successful download. `None` on a cache hit, since
    /// the provider that originally populated the cache entry isn't
    /// recorded. Informational only; not part of the dataset's
    /// identity/equality.
    pub source_provider: Option<String>,
}

impl GridDataset {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            variables: HashMap::new(),
            units: HashMap::new(),
            source_provider: None,
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        self.coordinates.dims()
    }

    /// Insert a variable, validating its length against the dataset shape.
    pub fn insert_variable(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
        unit: Option<String>,
    ) -> Result<(), GridError> {
        let expected = self.coordinates.len();
        if values.len() != expected {
            return Err(GridError::VariableSizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        let name = name.into();
        if let Some(unit) = unit {
            self.units.insert(name.clone(), unit);
        }
        self.variables.insert(name, values);
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        self.variables.get(name).map(|v| v.as_slice())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn unit_of(&self, name: &str) -> Option<&str> {
        self.units.get(name).map(|s| s.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("variable has {actual} values, expected {expected} for this grid's shape")]
    VariableSizeMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gfs_grid_bbox() {
        let grid = grids::gfs_0p25();
        let bbox = grid.bbox();
        assert!(bbox.min_x >= -0.001 && bbox.min_x <= 0.001);
        assert!(bbox.min_y >= -90.001 && bbox.min_y <= -89.999);
        assert!(bbox.max_x >= 359.74 && bbox.max_x <= 359.76);
        assert!(bbox.max_y >= 89.999 && bbox.max_y <= 90.001);
    }

    #[test]
    fn test_index_to_coord() {
        let grid = grids::gfs_0p25();
        let point = grid.index_to_coord(0, 0).unwrap();
        assert!((point.x - 0.0).abs() < 0.001);
        assert!((point.y - 90.0).abs() < 0.001);
    }

    #[test]
    fn test_scan_mode_from_grib2() {
        let mode = ScanMode::from_grib2_flag(0x40);
        assert!(!mode.i_negative);
        assert!(mode.j_positive);
        assert!(!mode.j_consecutive);
    }

    #[test]
    fn regular_lat_lon_dims() {
        let coords = Coordinates::RegularLatLon {
            lats: vec![50.0, 49.5, 49.0],
            lons: vec![-125.0, -124.5],
        };
        assert_eq!(coords.dims(), (3, 2));
        assert_eq!(coords.len(), 6);
    }

    #[test]
    fn insert_variable_rejects_wrong_length() {
        let coords = Coordinates::RegularLatLon {
            lats: vec![50.0, 49.0],
            lons: vec![-125.0, -124.0],
        };
        let mut ds = GridDataset::new(coords);
        let err = ds
            .insert_variable("t2m", vec![1.0, 2.0, 3.0], Some("K".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            GridError::VariableSizeMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn insert_variable_records_unit() {
        let coords = Coordinates::RegularLatLon {
            lats: vec![50.0, 49.0],
            lons: vec![-125.0, -124.0],
        };
        let mut ds = GridDataset::new(coords);
        ds.insert_variable("t2m", vec![1.0, 2.0, 3.0, 4.0], Some("K".to_string()))
            .unwrap();
        assert_eq!(ds.unit_of("t2m"), Some("K"));
        assert_eq!(ds.variable("t2m").unwrap().len(), 4);
    }

    #[test]
    fn longitude_normalization() {
        let mut coords = Coordinates::RegularLatLon {
            lats: vec![50.0],
            lons: vec![200.0, 359.0, 10.0],
        };
        coords.normalize_longitudes();
        match coords {
            Coordinates::RegularLatLon { lons, .. } => {
                assert!((lons[0] - (-160.0)).abs() < 1e-9);
                assert!((lons[1] - (-1.0)).abs() < 1e-9);
                assert!((lons[2] - 10.0).abs() < 1e-9);
            }
            _ => unreachable!(),
        }
    }
}

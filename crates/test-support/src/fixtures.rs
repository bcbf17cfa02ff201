//! Common test fixtures for forecast-pipeline tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in the Pacific Northwest forecast map production pipeline.

/// Common bounding box definitions for testing.
pub mod bbox {
    /// The Pacific Northwest publish region (spec default).
    pub const PNW: (f64, f64, f64, f64) = (-130.0, 40.0, -110.0, 55.0);

    /// Global bounding box (-180 to 180, -90 to 90).
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Continental United States bounding box.
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// A small test tile, smaller than the PNW region.
    pub const SMALL_TILE: (f64, f64, f64, f64) = (-125.0, 45.0, -120.0, 48.0);

    /// Single point (degenerate bbox).
    pub const POINT: (f64, f64, f64, f64) = (0.0, 0.0, 0.0, 0.0);

    /// Invalid bbox (min > max).
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Common grid specifications for testing.
pub mod grid {
    /// GFS global grid (0.25 degree resolution).
    pub const GFS_GLOBAL: GridSpec = GridSpec {
        width: 1440,
        height: 721,
        min_lon: 0.0,
        max_lon: 359.75,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// HRRR CONUS grid (3km resolution, Lambert Conformal native).
    pub const HRRR_CONUS: GridSpec = GridSpec {
        width: 1799,
        height: 1059,
        min_lon: -134.09,
        max_lon: -60.92,
        min_lat: 21.14,
        max_lat: 52.62,
    };

    /// Small regular lat/lon grid covering the PNW, for fast unit tests.
    pub const PNW_SMALL: GridSpec = GridSpec {
        width: 40,
        height: 30,
        min_lon: -130.0,
        max_lon: -110.0,
        min_lat: 40.0,
        max_lat: 55.0,
    };

    /// Simple 10x10 test grid.
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        min_lon: -10.0,
        max_lon: 10.0,
        min_lat: -10.0,
        max_lat: 10.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        pub fn resolution(&self) -> (f64, f64) {
            let dx = (self.max_lon - self.min_lon) / self.width as f64;
            let dy = (self.max_lat - self.min_lat) / self.height as f64;
            (dx, dy)
        }

        pub fn bbox(&self) -> (f64, f64, f64, f64) {
            (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
        }

        /// Evenly spaced latitudes, descending (north to south), matching
        /// the scan order most GRIB2 surface products use.
        pub fn lats(&self) -> Vec<f64> {
            let (_, dy) = self.resolution();
            (0..self.height)
                .map(|row| self.max_lat - row as f64 * dy)
                .collect()
        }

        /// Evenly spaced longitudes, ascending.
        pub fn lons(&self) -> Vec<f64> {
            let (dx, _) = self.resolution();
            (0..self.width)
                .map(|col| self.min_lon + col as f64 * dx)
                .collect()
        }
    }
}

/// Common model run times and forecast hours for testing.
pub mod time {
    /// A fixed reference run time (2026-02-01T00:00:00Z).
    pub const REFERENCE_RUN: &str = "2026-02-01T00:00:00Z";

    /// GFS-like model run hours (synoptic cycle).
    pub const SYNOPTIC_CYCLES: [u32; 4] = [0, 6, 12, 18];

    /// HRRR-like model run hours (hourly).
    pub const HOURLY_CYCLES: [u32; 24] = [
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
    ];

    /// Common forecast hours spanning short- and long-range.
    pub const FORECAST_HOURS: [u32; 8] = [0, 1, 3, 6, 12, 24, 48, 120];
}

/// The six canonical `variable_id`s a render target may request.
pub mod variables {
    pub const TMP2M: &str = "tmp2m";
    pub const PRECIP_TOTAL: &str = "precip_total";
    pub const SNOW_TOTAL: &str = "snow_total";
    pub const MSLP_PRECIP: &str = "mslp_precip";
    pub const TEMP_WIND_850: &str = "temp_wind_850";
    pub const REFLECTIVITY: &str = "reflectivity";

    pub const ALL: [&str; 6] =
        [TMP2M, PRECIP_TOTAL, SNOW_TOTAL, MSLP_PRECIP, TEMP_WIND_850, REFLECTIVITY];
}

/// Raw GRIB2 field identifiers used across fixtures.
pub mod raw_fields {
    pub const TMP2M: &str = "tmp2m";
    pub const TMP_850: &str = "tmp_850";
    pub const UGRD_850: &str = "ugrd_850";
    pub const VGRD_850: &str = "vgrd_850";
    pub const UGRD10M: &str = "ugrd10m";
    pub const VGRD10M: &str = "vgrd10m";
    pub const PRMSL: &str = "prmsl";
    pub const TP: &str = "tp";
    pub const PRATE: &str = "prate";
    pub const CSNOW: &str = "csnow";
    pub const REFC: &str = "refc";
}

/// Sample model ids used across fixtures, matching a synoptic-scale global
/// model and a high-resolution regional model.
pub mod models {
    pub const GLOBAL_025: &str = "global025";
    pub const REGIONAL_3KM: &str = "regional3km";
}

//! Surface station catalog entries.

use serde::{Deserialize, Serialize};

/// One entry in the station catalog, loaded once per process and filtered
/// per render region. Station `id` is an internal lookup key only; it is
/// never rendered onto a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub lat: f64,
    /// Longitude in `[-180, 180]`.
    pub lon: f64,
    /// Declutter priority: higher weight stations are kept over lower
    /// weight ones when two fall in the same grid-binning cell.
    pub weight: f64,
    /// Always rendered regardless of the declutter selector, used for a
    /// handful of always-visible reference stations.
    #[serde(default)]
    pub always_include: bool,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lat,
            lon,
            weight: 1.0,
            always_include: false,
        }
    }
}

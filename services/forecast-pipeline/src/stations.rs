//! Station Catalog + Sampler (spec `4.6`): loads the on-disk station
//! catalog, picks a grid-locator strategy from a dataset's coordinate
//! shape, decluttera a render's station set, and draws the value labels.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::RgbaImage;
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};
use serde::Deserialize;
use tracing::warn;

use pnw_common::{BoundingBox, Coordinates, GridDataset, Station};
use projection::{bilinear_sample, lat_lon_to_index, nearest_neighbor_index, LambertConformal};
use renderer::style::ColorStop;

use crate::config::OverlayPolicy;

#[derive(Debug, Deserialize)]
struct RawStation {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    always_include: bool,
}

fn default_weight() -> f64 {
    1.0
}

/// Loads the station catalog JSON array and applies overrides, following
/// `pnw_common::Station`'s `serde`-derived shape.
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    pub fn load(catalog_path: &Path, overrides_path: Option<&Path>) -> Result<Self, pnw_common::ConfigError> {
        let mut stations = Self::load_raw(catalog_path)?;

        if let Some(overrides_path) = overrides_path {
            let overrides = Self::load_raw(overrides_path)?;
            let mut by_id: HashMap<String, Station> =
                stations.drain(..).map(|s| (s.id.clone(), s)).collect();
            for over in overrides {
                by_id.insert(over.id.clone(), over);
            }
            stations = by_id.into_values().collect();
        }

        Ok(Self { stations })
    }

    fn load_raw(path: &Path) -> Result<Vec<Station>, pnw_common::ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| pnw_common::ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let raw: Vec<RawStation> =
            serde_json::from_str(&contents).map_err(|e| pnw_common::ConfigError::Json {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(raw
            .into_iter()
            .map(|r| {
                let mut s = Station::new(r.id, r.name, r.lat, r.lon);
                s.weight = r.weight;
                s.always_include = r.always_include;
                s
            })
            .collect())
    }

    /// Stations falling within (or forced inside regardless of) the region.
    pub fn for_region(&self, region: &BoundingBox) -> Vec<&Station> {
        self.stations
            .iter()
            .filter(|s| s.always_include || region.contains_point(s.lon, s.lat))
            .collect()
    }
}

/// The three sampler strategies spec `4.6` describes, chosen once per
/// dataset by inspecting its coordinate shape.
pub enum GridLocator {
    RegularLatLon { lats: Vec<f64>, lons: Vec<f64> },
    ProjectedRectilinear { lambert: LambertConformal },
    Curvilinear { lats: Vec<f64>, lons: Vec<f64>, nx: usize, ny: usize },
}

impl GridLocator {
    /// Builds the locator for a dataset. The projected-rectilinear branch
    /// has no CF `grid_mapping` attribute to inspect on this concrete
    /// `GridDataset` contract (that inspection already happened upstream,
    /// when the fetcher decoded the GRIB2 grid-definition section into a
    /// `LambertParams`), so it simply reads the projection descriptor
    /// already carried by `Coordinates::ProjectedXY`.
    pub fn for_dataset(dataset: &GridDataset) -> Self {
        match &dataset.coordinates {
            Coordinates::RegularLatLon { lats, lons } => GridLocator::RegularLatLon {
                lats: lats.clone(),
                lons: lons.clone(),
            },
            Coordinates::ProjectedXY { xs, ys, projection } => GridLocator::ProjectedRectilinear {
                lambert: LambertConformal::from_params(projection, xs.len(), ys.len()),
            },
            Coordinates::Curvilinear { lats, lons, nx, ny } => GridLocator::Curvilinear {
                lats: lats.clone(),
                lons: lons.clone(),
                nx: *nx,
                ny: *ny,
            },
        }
    }

    /// Sample a variable's value nearest a station's (lat, lon). Returns
    /// `None` if the point falls outside the grid.
    pub fn sample(&self, values: &[f32], lat: f64, lon: f64) -> Option<f32> {
        match self {
            GridLocator::RegularLatLon { lats, lons } => {
                let (x, y) = lat_lon_to_index(lats, lons, lat, lon)?;
                bilinear_sample(values, lons.len(), lats.len(), x, y)
            }
            GridLocator::ProjectedRectilinear { lambert } => {
                let (i, j) = lambert.geo_to_grid(lat, lon);
                bilinear_sample(values, lambert.nx, lambert.ny, i, j)
            }
            GridLocator::Curvilinear { lats, lons, nx, ny } => {
                let points: Vec<(f64, f64)> = lats.iter().zip(lons.iter()).map(|(&a, &b)| (a, b)).collect();
                let idx = nearest_neighbor_index(&points, (lat, lon))?;
                let _ = (nx, ny);
                values.get(idx).copied()
            }
        }
    }
}

/// One station picked for rendering, with its screen position and sampled
/// value.
pub struct PlottedStation<'a> {
    pub station: &'a Station,
    pub px: u32,
    pub py: u32,
    pub value: f32,
}

/// Bins stations into a coarse screen grid in normalized bbox space,
/// keeping the highest-weighted station per bin and force-including any
/// `always_include` station regardless of spacing (spec `4.6`).
pub fn declutter<'a>(
    stations: &[&'a Station],
    dataset: &GridDataset,
    region: &BoundingBox,
    locator: &GridLocator,
    variable_values: &[f32],
    image_width: u32,
    image_height: u32,
    policy: OverlayPolicy,
) -> Vec<PlottedStation<'a>> {
    if !policy.enabled {
        return Vec::new();
    }

    let cols = (image_width / policy.min_spacing_px.max(1)).max(1);
    let rows = (image_height / policy.min_spacing_px.max(1)).max(1);
    let mut bins: HashMap<(u32, u32), PlottedStation<'a>> = HashMap::new();
    let mut forced: Vec<PlottedStation<'a>> = Vec::new();

    for &station in stations {
        let Some(value) = locator.sample(variable_values, station.lat, station.lon) else {
            continue;
        };
        if value.is_nan() {
            continue;
        }

        let nx = ((station.lon - region.min_x) / region.width()).clamp(0.0, 1.0);
        let ny = 1.0 - ((station.lat - region.min_y) / region.height()).clamp(0.0, 1.0);
        let px = (nx * image_width as f64) as u32;
        let py = (ny * image_height as f64) as u32;

        let plotted = PlottedStation { station, px, py, value };

        if station.always_include {
            forced.push(plotted);
            continue;
        }

        let bin = (
            (nx * cols as f64) as u32,
            (ny * rows as f64) as u32,
        );
        match bins.get(&bin) {
            Some(existing) if existing.station.weight >= station.weight => {}
            _ => {
                bins.insert(bin, plotted);
            }
        }
    }

    let _ = dataset;
    let mut result: Vec<PlottedStation<'a>> = bins.into_values().collect();
    result.extend(forced);
    result
}

/// Draws value-only labels (no station ids, per spec `4.6`) at each plotted
/// station's pixel position, reusing the same font/drawing primitives
/// `renderer::numbers` uses internally.
pub fn render_station_labels(canvas: &mut RgbaImage, stations: &[PlottedStation<'_>], stops: &[ColorStop], font_size: f32) {
    let Some(font) = Font::try_from_bytes(renderer::numbers::embedded_font_data()) else {
        warn!("station label font failed to load, skipping overlay");
        return;
    };
    let scale = Scale::uniform(font_size);

    for plotted in stations {
        let color = renderer::numbers::get_color_for_value(plotted.value, stops);
        let label = renderer::numbers::format_value(plotted.value);
        let x = plotted.px as i32 - (label.len() as i32 * font_size as i32 / 4);
        let y = plotted.py as i32 - font_size as i32 / 2;
        draw_text_mut(canvas, color, x, y, scale, &font, &label);
    }
}

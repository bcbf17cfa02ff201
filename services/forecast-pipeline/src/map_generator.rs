//! Map Generator (spec `4.7`): renders one variable's PNG for a single
//! `(model, run_time, forecast_hour)`, compositing the raster layer with
//! whatever contour/wind-barb/station overlays that variable calls for,
//! plus a fixed legend, and publishes it with the same atomic
//! `.partial`-then-rename discipline `GribCache` uses for downloads.

use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};
use tracing::warn;

use derived_fields::model_registry::ModelConfig;
use pnw_common::{BoundingBox, ForecastHour, GridDataset, RunTime, Station};
use renderer::barbs::{self, BarbConfig};
use renderer::contour::{self, ContourConfig};
use renderer::gradient::{self, Color};
use renderer::legend;
use renderer::numbers::get_color_for_value;
use renderer::png::create_png_auto;
use renderer::style::StyleDefinition;

use crate::config::OverlayPolicy;
use crate::error::RenderError;
use crate::stations::{declutter, render_station_labels, GridLocator};

/// Output canvas size for every published map. Fixed so animation frames
/// across forecast hours line up pixel-for-pixel.
pub const CANVAS_WIDTH: u32 = 1024;
pub const CANVAS_HEIGHT: u32 = 1024;

const MSLP_CONTOUR_INTERVAL_HPA: f32 = 4.0;
const WIND_BARB_COUNT: usize = 24;
const LEGEND_MARGIN_PX: i64 = 12;
const STATION_LABEL_FONT_SIZE: f32 = 12.0;

/// What a render target needs beyond its primary raster field, grounded in
/// `derived_fields::VariableRegistry`'s per-variable requirement table: the
/// raster/derived field name to shade, and the optional composite fields
/// (spec `4.7`'s "co-located overlays only") for isobars and wind barbs.
struct RenderSpec {
    raster_field: &'static str,
    contour_field: Option<&'static str>,
    wind_fields: Option<(&'static str, &'static str)>,
}

fn render_spec_for(variable_id: &str) -> Result<RenderSpec, RenderError> {
    match variable_id {
        "tmp2m" => Ok(RenderSpec { raster_field: "tmp2m", contour_field: None, wind_fields: None }),
        "precip_total" => Ok(RenderSpec { raster_field: "tp_total", contour_field: None, wind_fields: None }),
        "snow_total" => Ok(RenderSpec { raster_field: "tp_snow_total", contour_field: None, wind_fields: None }),
        "mslp_precip" => Ok(RenderSpec { raster_field: "tp_total", contour_field: Some("prmsl"), wind_fields: None }),
        "temp_wind_850" => Ok(RenderSpec {
            raster_field: "tmp_850",
            contour_field: None,
            wind_fields: Some(("ugrd_850", "vgrd_850")),
        }),
        "reflectivity" => Ok(RenderSpec { raster_field: "refc", contour_field: None, wind_fields: None }),
        other => Err(RenderError::Failed {
            model_id: String::new(),
            variable_id: other.to_string(),
            forecast_hour: 0,
            reason: "no render spec for this variable_id".to_string(),
        }),
    }
}

/// Everything `generate_map` needs that outlives a single call: the
/// publish root, the region the dataset was fetched for, the station set
/// already filtered to that region, and the per-variable style/overlay
/// configuration.
pub struct MapGenerator<'a> {
    pub storage_path: &'a Path,
    pub region: BoundingBox,
    pub stations: &'a [&'a Station],
}

impl<'a> MapGenerator<'a> {
    /// Renders and publishes `variable_id`'s map for one forecast hour.
    /// Returns the published path. Any failure is a `RenderError`; spec `7`
    /// treats these as logged-and-skipped, never retried within the run.
    pub async fn generate_map(
        &self,
        dataset: &GridDataset,
        variable_id: &str,
        model: &ModelConfig,
        run_time: RunTime,
        forecast_hour: ForecastHour,
        style: &StyleDefinition,
        overlay_policy: OverlayPolicy,
    ) -> Result<PathBuf, RenderError> {
        let spec = render_spec_for(variable_id).map_err(|_| RenderError::Failed {
            model_id: model.id.clone(),
            variable_id: variable_id.to_string(),
            forecast_hour: forecast_hour.value(),
            reason: "no render spec for this variable_id".to_string(),
        })?;

        let fail = |reason: String| RenderError::Failed {
            model_id: model.id.clone(),
            variable_id: variable_id.to_string(),
            forecast_hour: forecast_hour.value(),
            reason,
        };

        let (grid_height, grid_width) = dataset.dims();
        let raster_values = dataset
            .variable(spec.raster_field)
            .ok_or_else(|| fail(format!("missing raster field '{}'", spec.raster_field)))?;

        let (min_value, max_value) = style_value_range(style);
        let resampled = gradient::resample_grid(
            raster_values,
            grid_width,
            grid_height,
            CANVAS_WIDTH as usize,
            CANVAS_HEIGHT as usize,
        );
        let stops = style.stops.clone();
        let pixels = gradient::render_grid(
            &resampled,
            CANVAS_WIDTH as usize,
            CANVAS_HEIGHT as usize,
            min_value,
            max_value,
            move |t: f32| {
                let value = min_value + t * (max_value - min_value);
                color_for_value(value, &stops)
            },
        );
        let mut canvas = RgbaImage::from_raw(CANVAS_WIDTH, CANVAS_HEIGHT, pixels)
            .ok_or_else(|| fail("raster buffer size mismatch".to_string()))?;

        if let Some(contour_field) = spec.contour_field {
            if let Some(values) = dataset.variable(contour_field) {
                let hpa: Vec<f32> = values.iter().map(|v| v / 100.0).collect();
                let resampled_hpa = gradient::resample_grid(
                    &hpa,
                    grid_width,
                    grid_height,
                    CANVAS_WIDTH as usize,
                    CANVAS_HEIGHT as usize,
                );
                let (c_min, c_max) = finite_range(&resampled_hpa);
                let levels = contour::generate_contour_levels(c_min, c_max, MSLP_CONTOUR_INTERVAL_HPA);
                let config = ContourConfig {
                    levels,
                    labels_enabled: true,
                    ..ContourConfig::default()
                };
                let overlay_pixels =
                    contour::render_contours(&resampled_hpa, CANVAS_WIDTH as usize, CANVAS_HEIGHT as usize, &config);
                composite_overlay(&mut canvas, &overlay_pixels)?;
            } else {
                warn!(variable_id, contour_field, "contour field absent, skipping isobars");
            }
        }

        if let Some((u_field, v_field)) = spec.wind_fields {
            match (dataset.variable(u_field), dataset.variable(v_field)) {
                (Some(u), Some(v)) => {
                    let overlay_pixels = barbs::render_wind_barbs(
                        u,
                        v,
                        grid_width,
                        grid_height,
                        CANVAS_WIDTH as usize,
                        CANVAS_HEIGHT as usize,
                        WIND_BARB_COUNT,
                        &BarbConfig::default(),
                    );
                    composite_overlay(&mut canvas, &overlay_pixels)?;
                }
                _ => warn!(variable_id, "wind fields absent, skipping barb overlay"),
            }
        }

        if overlay_policy.enabled {
            let locator = GridLocator::for_dataset(dataset);
            let plotted = declutter(
                self.stations,
                dataset,
                &self.region,
                &locator,
                raster_values,
                CANVAS_WIDTH,
                CANVAS_HEIGHT,
                overlay_policy,
            );
            render_station_labels(&mut canvas, &plotted, &style.stops, STATION_LABEL_FONT_SIZE);
        }

        if let Some(legend_img) = legend::render_legend(style) {
            let y = CANVAS_HEIGHT as i64 - legend_img.height() as i64 - LEGEND_MARGIN_PX;
            imageops::overlay(&mut canvas, &legend_img, LEGEND_MARGIN_PX, y.max(0));
        }

        let png_bytes = create_png_auto(canvas.as_raw(), CANVAS_WIDTH as usize, CANVAS_HEIGHT as usize)
            .map_err(|e| fail(format!("png encoding failed: {e}")))?;

        self.publish(&png_bytes, model, variable_id, run_time, forecast_hour).await
    }

    async fn publish(
        &self,
        png_bytes: &[u8],
        model: &ModelConfig,
        variable_id: &str,
        run_time: RunTime,
        forecast_hour: ForecastHour,
    ) -> Result<PathBuf, RenderError> {
        let images_dir = self.storage_path.join("images");
        tokio::fs::create_dir_all(&images_dir).await?;

        let filename = format!(
            "{}_{}_{}_{}_{}.png",
            model.id,
            run_time.date_tag(),
            run_time.hour_tag(),
            variable_id,
            forecast_hour.tag()
        );
        let final_path = images_dir.join(&filename);
        let partial_path = images_dir.join(format!("{filename}.partial"));

        tokio::fs::write(&partial_path, png_bytes).await?;
        tokio::fs::rename(&partial_path, &final_path).await?;

        Ok(final_path)
    }
}

/// Composites an RGBA overlay buffer (same dimensions as `canvas`) onto it
/// using standard alpha-over blending, the way `legend::render_legend`'s
/// caller is expected to layer the color bar on top of the raster.
fn composite_overlay(canvas: &mut RgbaImage, overlay_pixels: &[u8]) -> Result<(), RenderError> {
    let overlay_img = RgbaImage::from_raw(CANVAS_WIDTH, CANVAS_HEIGHT, overlay_pixels.to_vec())
        .ok_or_else(|| RenderError::Failed {
            model_id: String::new(),
            variable_id: String::new(),
            forecast_hour: 0,
            reason: "overlay buffer size mismatch".to_string(),
        })?;
    imageops::overlay(canvas, &overlay_img, 0, 0);
    Ok(())
}

fn color_for_value(value: f32, stops: &[renderer::style::ColorStop]) -> Color {
    if value.is_nan() {
        return Color::new(0, 0, 0, 0);
    }
    let rgba = get_color_for_value(value, stops);
    Color::new(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// The fixed value range a style's stops cover, falling back to the first
/// and last stop values when no explicit `range` was configured (spec
/// `4.7`'s "identical level breaks across runs" invariant needs one fixed
/// range per variable, not a per-render min/max).
fn style_value_range(style: &StyleDefinition) -> (f32, f32) {
    if let Some(range) = &style.range {
        return (range.min, range.max);
    }
    let min = style.stops.iter().map(|s| s.value).fold(f32::INFINITY, f32::min);
    let max = style.stops.iter().map(|s| s.value).fold(f32::NEG_INFINITY, f32::max);
    if min.is_finite() && max.is_finite() && min < max {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

fn finite_range(values: &[f32]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if min.is_finite() && max.is_finite() && min < max {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

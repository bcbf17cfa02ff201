//! Fixed-color-level legend rendering.
//!
//! Every map product uses a static per-variable color scale (`StyleDefinition`),
//! not a per-request min/max normalization, so the legend is just that
//! scale's `stops` drawn as a labeled color ramp.

use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};

use crate::style::{hex_to_rgba, ColorStop, Legend, StyleDefinition};

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Render a horizontal color-bar legend for a style's fixed levels.
///
/// Returns `None` if the style has no color stops (nothing to draw).
pub fn render_legend(style: &StyleDefinition) -> Option<RgbaImage> {
    if style.stops.is_empty() {
        return None;
    }

    let legend_meta = style.legend.clone().unwrap_or(Legend {
        title: None,
        orientation: Some("horizontal".to_string()),
        ticks: None,
        width: None,
        height: None,
    });

    let width = legend_meta.width.unwrap_or(400);
    let height = legend_meta.height.unwrap_or(60);
    let mut img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    let font = Font::try_from_bytes(FONT_DATA);

    let bar_top = 8u32;
    let bar_height = height.saturating_sub(28).max(8);
    let n = style.stops.len();
    let segment_width = (width as f32 / n as f32).max(1.0);

    for (i, stop) in style.stops.iter().enumerate() {
        let (r, g, b, a) = hex_to_rgba(&stop.color).unwrap_or((128, 128, 128, 255));
        let x0 = (i as f32 * segment_width) as u32;
        let x1 = (((i + 1) as f32 * segment_width) as u32).min(width);
        for x in x0..x1 {
            for y in bar_top..(bar_top + bar_height) {
                img.put_pixel(x, y, Rgba([r, g, b, a]));
            }
        }
    }

    if let Some(font) = font {
        let scale = Scale::uniform(11.0);
        let label_y = (bar_top + bar_height + 4) as i32;
        for (i, stop) in tick_stops(&style.stops, legend_meta.ticks).into_iter().enumerate() {
            let label = stop
                .label
                .clone()
                .unwrap_or_else(|| format!("{:.0}", stop.value));
            let x = (i as f32 * segment_width) as i32;
            draw_text_mut(&mut img, Rgba([0, 0, 0, 255]), x, label_y, scale, &font, &label);
        }
        if let Some(title) = &legend_meta.title {
            draw_text_mut(&mut img, Rgba([0, 0, 0, 255]), 2, 0, scale, &font, title);
        }
    } else {
        tracing::warn!("failed to load legend font; color bar drawn without labels");
    }

    Some(img)
}

fn tick_stops(stops: &[ColorStop], max_ticks: Option<u32>) -> Vec<ColorStop> {
    let max_ticks = max_ticks.unwrap_or(stops.len() as u32).max(1) as usize;
    if stops.len() <= max_ticks {
        return stops.to_vec();
    }
    let stride = (stops.len() as f32 / max_ticks as f32).ceil() as usize;
    stops.iter().step_by(stride.max(1)).cloned().collect()
}

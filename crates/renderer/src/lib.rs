//! Image rendering for weather map production: gradient rasters, MSLP
//! contours, wind barbs, station value labels, a fixed-color-level legend,
//! and final PNG encoding.

pub mod barbs;
pub mod buffer_pool;
pub mod contour;
pub mod gradient;
pub mod legend;
pub mod numbers;
pub mod png;
pub mod style;

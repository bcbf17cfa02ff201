//! Map projections and grid interpolation used for grid alignment and
//! station sampling.
//!
//! Implements map projections from scratch without external dependencies.

pub mod geographic;
pub mod lambert;

pub use geographic::{bilinear_sample, lat_lon_to_index, nearest_neighbor_index, nearest_sample};
pub use lambert::LambertConformal;

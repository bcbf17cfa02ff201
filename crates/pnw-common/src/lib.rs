//! Shared types used across the forecast pipeline workspace: bounding boxes,
//! grid/coordinate containers, run-time/forecast-hour identifiers, the
//! station catalog entry type, and the startup-configuration error taxonomy.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod station;
pub mod time;

pub use bbox::BoundingBox;
pub use error::ConfigError;
pub use grid::{Coordinates, GridDataset, GridError, GridPoint, GridSpec, LambertParams, ScanMode};
pub use station::Station;
pub use time::{ForecastHour, RunTime, TimeError};

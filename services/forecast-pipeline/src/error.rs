//! Service-level error taxonomy.
//!
//! Mirrors the kinds (not necessarily the types) from spec `7`: each crate
//! owns its own `thiserror` enum, and this is the one the scheduler/fetcher
//! see at their boundary. A worker task classifies any error it produces
//! into one of these before reporting a `TaskOutcome` back to the scheduler;
//! nothing here is allowed to unwind across a task boundary.

use thiserror::Error;

use derived_fields::DerivedFieldError;
use pnw_common::{ConfigError, GridError};
use pipeline_storage::CacheError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("all providers exhausted for {model_id} {run_time:?} fh{forecast_hour:03} product {product}: {message}")]
    AllProvidersFailed {
        model_id: String,
        run_time: String,
        forecast_hour: u32,
        product: String,
        message: String,
    },

    #[error("grib cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("grib decode error: {0}")]
    Decode(#[from] DataDecodeError),

    #[error("missing field after fetch: {0}")]
    MissingField(String),

    #[error("region subset produced an empty grid")]
    RegionMismatch,

    #[error("grid error: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Error)]
pub enum DataDecodeError {
    #[error("grib2 parse failure for {path}: {reason}")]
    Grib2Parse { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed for {model_id} {variable_id} fh{forecast_hour:03}: {reason}")]
    Failed {
        model_id: String,
        variable_id: String,
        forecast_hour: u32,
        reason: String,
    },

    #[error("io error writing publish artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
#[error("cancelled by shutdown signal")]
pub struct CancelledError;

/// What a worker task reports back to the scheduler. Never thrown; always
/// returned. Mirrors spec `9`'s `TaskOutcome` redesign note.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success { publish_path: String },
    Failed { kind: &'static str, message: String },
    Skipped { reason: String },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    DerivedField(#[from] DerivedFieldError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

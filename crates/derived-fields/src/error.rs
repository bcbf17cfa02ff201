//! Error types for registry lookups and derived-field computation.

use thiserror::Error;

pub use pnw_common::ConfigError;

/// A required raw field was absent after a fetch, or a derivation's input
/// bucket has not appeared yet.
#[derive(Debug, Error)]
pub enum MissingFieldError {
    #[error("field '{field}' missing from dataset for model '{model_id}' fh {forecast_hour}")]
    Field {
        model_id: String,
        forecast_hour: u32,
        field: String,
    },

    #[error("accumulation bucket fh={bucket_fh} required for total through fh={through_fh} is not yet available")]
    MissingBucket { bucket_fh: u32, through_fh: u32 },
}

/// A region-bbox subset produced an empty grid, which is always a
/// configuration bug (region does not intersect the model's native grid).
#[derive(Debug, Error)]
#[error("region subset ({west}, {south}, {east}, {north}) does not intersect the source grid")]
pub struct RegionMismatchError {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

#[derive(Debug, Error)]
pub enum DerivedFieldError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MissingField(#[from] MissingFieldError),

    #[error(transparent)]
    RegionMismatch(#[from] RegionMismatchError),

    #[error(transparent)]
    Grid(#[from] pnw_common::GridError),
}

pub type DerivedFieldResult<T> = Result<T, DerivedFieldError>;

//! Durable and in-process storage for the forecast pipeline:
//! - a content-addressed filesystem cache for downloaded GRIB2 files
//! - in-process run-progress tracking

pub mod error;
pub mod grib_cache;
pub mod run_state;

pub use error::{CacheError, CacheResult};
pub use grib_cache::{filter_signature, CacheKey, GribCache, RetentionPolicy};
pub use run_state::{RunPhase, RunState, RunStateTable};

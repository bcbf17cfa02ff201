//! GRIB cache error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("lock for {key} held by another writer after {attempts} attempts")]
    LockContention { key: String, attempts: u32 },

    #[error("download for {key} failed: {message}")]
    DownloadFailed { key: String, message: String },

    #[error("download for {key} produced no file at the expected partial path")]
    DownloadIncomplete { key: String },
}

pub type CacheResult<T> = Result<T, CacheError>;

//! Startup-configuration error taxonomy.
//!
//! `ConfigError` is shared by every crate that loads `ModelConfig`,
//! `VariableRequirements`, or the station catalog, since all three are
//! validated once at process start and fail fast together.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("model '{model_id}': missing required field '{field}'")]
    MissingField { model_id: String, field: String },

    #[error("model '{model_id}': invalid value for field '{field}': {message}")]
    InvalidValue {
        model_id: String,
        field: String,
        message: String,
    },

    #[error("model '{model_id}' does not support variable '{variable_id}'")]
    UnsupportedVariable {
        model_id: String,
        variable_id: String,
    },

    #[error("unknown model id '{0}'")]
    UnknownModel(String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

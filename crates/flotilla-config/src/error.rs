//! Error types for config rendering.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for config rendering operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while rendering per-node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The template document for a service could not be located.
    #[error("template for {service} not found at {path}")]
    TemplateMissing { service: &'static str, path: PathBuf },

    /// A field the renderer must patch does not exist in the template.
    /// Signals a template/version mismatch, not bad input data.
    #[error("template is missing required field {field:?}")]
    FieldMissing { field: String },

    #[error("template parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Error types for tagbump-core

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// A release type override is not one of the known actions.
    #[error("invalid release type `{0}` (expected skip, custom, major, minor or patch)")]
    InvalidReleaseType(String),

    /// An enumerated setting has an unknown value.
    #[error("invalid {field} `{value}`")]
    InvalidValue {
        /// Setting name.
        field: &'static str,
        /// Value as given.
        value: String,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

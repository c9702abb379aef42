//! Error types for postpress infrastructure.

use miette::Diagnostic;

/// Main error type for configuration and setup operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum PostpressError {
    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    /// Configuration file with an extension we don't handle
    #[error("unsupported config format: {0}")]
    #[diagnostic(code(postpress::config::format))]
    UnsupportedFormat(String),
}

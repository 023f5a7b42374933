//! Error types for the `cfwg` core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for configuration and file-store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read, parsed, or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pre-write backup could not be taken; the target was not modified.
    #[error("Backup of {} failed: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the new file contents failed.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

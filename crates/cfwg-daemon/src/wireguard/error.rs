//! Tunnel configuration error types.

use std::path::PathBuf;

/// Errors produced while rendering, merging, or writing the tunnel file.
#[derive(Debug, thiserror::Error)]
pub enum WireGuardError {
    #[error("credentials are missing required key material: {}", .0.join(", "))]
    MissingKeyMaterial(Vec<&'static str>),

    #[error("existing configuration has no {0} section")]
    MissingSection(&'static str),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] cfwg_core::Error),
}

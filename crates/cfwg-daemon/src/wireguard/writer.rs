//! Applies rotated credentials to the tunnel file on disk.

use std::path::{Path, PathBuf};

use cfwg_core::Config;
use cfwg_core::backup::backup_then_write;

use crate::identity::RotatedCredentials;

use super::error::WireGuardError;
use super::merge::merge;
use super::render::{missing_key_material, render};

/// How the new file body was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Existing file kept, system-owned lines replaced.
    Merged,
    /// Full template written.
    Rendered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub mode: WriteMode,
    /// Copy of the previous file, if one existed.
    pub backup: Option<PathBuf>,
}

/// Writes the tunnel file, backing up whatever was there first.
#[derive(Debug, Clone)]
pub struct TunnelConfigWriter {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl TunnelConfigWriter {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.tunnel.config_path, &config.service.backup_dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a tunnel file is already present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read_existing(&self) -> Result<Option<String>, WireGuardError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WireGuardError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Merge `creds` into the existing file (or render a fresh one) and write it.
    ///
    /// Nothing is written when the credentials lack key material.
    pub fn update(&self, creds: &RotatedCredentials) -> Result<WriteOutcome, WireGuardError> {
        let missing = missing_key_material(creds);
        if !missing.is_empty() {
            return Err(WireGuardError::MissingKeyMaterial(missing));
        }

        let (body, mode) = match self.read_existing()? {
            Some(existing) => match merge(&existing, creds) {
                Ok(merged) => (merged, WriteMode::Merged),
                Err(WireGuardError::MissingSection(section)) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        section,
                        "Existing tunnel configuration is incomplete, rendering a full one"
                    );
                    (render(creds)?, WriteMode::Rendered)
                }
                Err(e) => return Err(e),
            },
            None => (render(creds)?, WriteMode::Rendered),
        };

        let backup = backup_then_write(&self.path, &self.backup_dir, &body)?;
        tracing::info!(
            path = %self.path.display(),
            mode = ?mode,
            "Updated tunnel configuration"
        );
        Ok(WriteOutcome { mode, backup })
    }
}

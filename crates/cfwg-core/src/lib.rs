//! cfwg Core Library
//!
//! Shared functionality for the cfwg daemon:
//! - Layered configuration (defaults, file, environment)
//! - Backup-then-write discipline for the shared tunnel config
//! - Common error types
//! - Tracing initialisation

pub mod backup;
pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{Config, LoadedConfig};
pub use error::{Error, Result};

//! Tunnel configuration file handling.
//!
//! Renders full configurations for fresh installs and merges rotated key
//! material into files created by the management UI, leaving operator-owned
//! settings such as `Address`, `DNS` and `AllowedIPs` untouched.

pub mod error;
pub mod inspect;
pub mod merge;
pub mod render;
pub mod writer;

pub use error::WireGuardError;
pub use inspect::{TunnelInspection, inspect, inspect_file};
pub use merge::merge;
pub use render::{placeholder_config, render};
pub use writer::{TunnelConfigWriter, WriteMode, WriteOutcome};

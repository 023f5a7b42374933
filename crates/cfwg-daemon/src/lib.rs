//! cfwg Daemon Library
//!
//! Keeps a management-UI-created WireGuard tunnel authenticated:
//! - Identity service client (registration, credentials, status)
//! - Line-preserving merge of rotated keys into the tunnel file
//! - systemd control of the tunnel unit
//! - Reconciliation loop with retry and backoff
//! - `status` and first-run setup commands

pub mod identity;
pub mod reconcile;
pub mod service;
pub mod setup;
pub mod status;
pub mod wireguard;

//! Host service-manager control for the tunnel unit.
//!
//! All interaction goes through `systemctl` via a [`CommandRunner`], so the
//! controller can be exercised without a real init system.

pub mod controller;
pub mod error;
pub mod runner;

pub use controller::{ApplyAction, ServiceController, looks_like_udm};
pub use error::ServiceError;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};

//! Periodic reconciliation of the tunnel against the identity service.

pub mod error;
pub mod policy;
pub mod reconciler;

pub use error::CycleError;
pub use policy::{FailureState, ReconcilePolicy};
pub use reconciler::{CycleReport, Reconciler};

//! Reconciliation cycle error types.

use crate::identity::IdentityError;
use crate::service::ServiceError;
use crate::wireguard::WireGuardError;

/// Why a reconciliation cycle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("authentication failed: {0}")]
    Auth(#[source] IdentityError),

    #[error("fetching credentials failed: {0}")]
    Fetch(#[source] IdentityError),

    #[error("tunnel service is not running")]
    ServiceInactive,

    #[error("checking tunnel service failed: {0}")]
    ServiceQuery(#[source] ServiceError),

    #[error("updating tunnel configuration failed: {0}")]
    Update(#[source] WireGuardError),

    #[error("applying tunnel configuration failed: {0}")]
    Apply(#[source] ServiceError),
}

impl CycleError {
    /// Whether this outcome counts toward the consecutive failure threshold.
    ///
    /// A stopped tunnel service is an operator decision and only delays the next cycle.
    pub const fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::ServiceInactive | Self::ServiceQuery(_))
    }
}

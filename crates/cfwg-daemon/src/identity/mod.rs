//! Identity-service integration.
//!
//! Provides a reqwest-based client that registers this device, caches the
//! resulting token, fetches rotated WireGuard credentials, and keeps the
//! registration alive. The reconciliation loop talks to it through the
//! [`IdentityApi`] trait so tests can substitute fakes.

mod client;
mod error;
pub mod types;


use async_trait::async_trait;

pub use client::{DEFAULT_TOKEN_LIFETIME, IdentityClient, IdentityEndpoint, REQUEST_TIMEOUT};
pub use error::IdentityError;
pub use types::{DeviceToken, RotatedCredentials};

/// Operations the reconciliation loop and `status` need from the identity service.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Handle used by the detached mid-interval registration refresh.
    type Refresher: RegistrationRefresh + 'static;

    /// Return a valid device token, registering again once the cached one expires.
    async fn authenticate(&mut self) -> Result<DeviceToken, IdentityError>;

    /// Fetch the current rotated credentials for this device.
    async fn fetch_credentials(
        &self,
        token: &DeviceToken,
    ) -> Result<RotatedCredentials, IdentityError>;

    /// Whether the service considers this device's tunnel active.
    async fn device_active(&self, token: &DeviceToken) -> Result<bool, IdentityError>;

    /// A cheap handle that can outlive the current cycle.
    fn refresher(&self) -> Self::Refresher;
}

/// Best-effort registration extension.
#[async_trait]
pub trait RegistrationRefresh: Send + Sync {
    async fn refresh_registration(&self, token: &str) -> Result<(), IdentityError>;
}

//! One-shot health report for the `status` command.

use std::path::{Path, PathBuf};

use crate::identity::IdentityApi;
use crate::service::{CommandRunner, ServiceController};

/// Outcome of a status check, from least to most healthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    ConfigMissing { path: PathBuf },
    ServiceInactive { unit: String },
    ServiceQueryFailed { message: String },
    AuthFailed { message: String },
    StatusUnknown { message: String },
    NotAuthenticated,
    Connected,
}

impl StatusReport {
    /// Process exit code: zero only when fully connected.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Connected => 0,
            _ => 1,
        }
    }

    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigMissing { path } => {
                write!(f, "No tunnel configuration file found at {}", path.display())
            }
            Self::ServiceInactive { unit } => write!(f, "Tunnel service {unit} is not active"),
            Self::ServiceQueryFailed { message } => {
                write!(f, "Error checking tunnel service status: {message}")
            }
            Self::AuthFailed { message } => {
                write!(f, "Tunnel is running but authentication failed: {message}")
            }
            Self::StatusUnknown { message } => write!(
                f,
                "Tunnel is running but identity service status is unknown: {message}"
            ),
            Self::NotAuthenticated => {
                write!(f, "Tunnel is running but the device is not authenticated")
            }
            Self::Connected => write!(f, "Tunnel is running and connected"),
        }
    }
}

/// Check the tunnel file, the service, and the device's status with the identity service.
pub async fn check<I, R>(
    tunnel_path: &Path,
    service: &ServiceController<R>,
    identity: &mut I,
) -> StatusReport
where
    I: IdentityApi,
    R: CommandRunner,
{
    if !tunnel_path.is_file() {
        return StatusReport::ConfigMissing {
            path: tunnel_path.to_path_buf(),
        };
    }

    match service.is_active() {
        Ok(true) => {}
        Ok(false) => {
            return StatusReport::ServiceInactive {
                unit: service.unit().to_string(),
            };
        }
        Err(e) => {
            return StatusReport::ServiceQueryFailed {
                message: e.to_string(),
            };
        }
    }

    let token = match identity.authenticate().await {
        Ok(token) => token,
        Err(e) => {
            return StatusReport::AuthFailed {
                message: e.to_string(),
            };
        }
    };

    match identity.device_active(&token).await {
        Ok(true) => StatusReport::Connected,
        Ok(false) => StatusReport::NotAuthenticated,
        Err(e) => StatusReport::StatusUnknown {
            message: e.to_string(),
        },
    }
}

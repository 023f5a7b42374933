//! Identity-service domain and wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer token issued at device registration.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// The raw bearer credential.
    pub fn bearer(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is usable strictly before its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Rotated tunnel credentials for the authenticated device.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RotatedCredentials {
    pub private_key: String,
    /// Local interface public key.
    pub public_key: String,
    pub peer_public_key: String,
    pub peer_preshared_key: Option<String>,
    /// Endpoint host (name or address, without port).
    pub endpoint: String,
    pub endpoint_port: u16,
    pub allowed_ips: Vec<String>,
    pub dns: Vec<String>,
}

impl RotatedCredentials {
    /// `host:port` as written to the `Endpoint` line. IPv6 hosts are bracketed.
    pub fn endpoint_addr(&self) -> String {
        if self.endpoint.contains(':') && !self.endpoint.starts_with('[') {
            format!("[{}]:{}", self.endpoint, self.endpoint_port)
        } else {
            format!("{}:{}", self.endpoint, self.endpoint_port)
        }
    }
}

impl std::fmt::Debug for RotatedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatedCredentials")
            .field("public_key", &self.public_key)
            .field("peer_public_key", &self.peer_public_key)
            .field("has_preshared_key", &self.peer_preshared_key.is_some())
            .field("endpoint", &self.endpoint_addr())
            .field("allowed_ips", &self.allowed_ips)
            .field("dns", &self.dns)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Common response envelope: `{ "success": bool, "result": T, "errors": [...] }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl<T> ApiEnvelope<T> {
    /// Human-readable summary of the `errors` array.
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "service reported failure".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub device_name: &'a str,
    pub device_type: &'a str,
    pub warp_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterResult {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireGuardResult {
    #[serde(default)]
    pub client_public_key: String,
    #[serde(default)]
    pub client_private_key: String,
    #[serde(default)]
    pub peer_public_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub endpoint_port: u16,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub peer_preshared_key: Option<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub rotation_expires_at: Option<String>,
}

impl From<WireGuardResult> for RotatedCredentials {
    fn from(r: WireGuardResult) -> Self {
        Self {
            private_key: r.client_private_key,
            public_key: r.client_public_key,
            peer_public_key: r.peer_public_key,
            peer_preshared_key: r.peer_preshared_key.filter(|k| !k.is_empty()),
            endpoint: r.endpoint,
            endpoint_port: r.endpoint_port,
            allowed_ips: r.allowed_ips,
            dns: r.dns_servers,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResult {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub warp_enabled: bool,
    #[serde(default)]
    pub last_seen: Option<String>,
}

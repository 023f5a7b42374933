//! Identity service REST client.
//!
//! Uses reqwest to register the device, fetch rotated WireGuard credentials,
//! query device status, and extend the registration.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use cfwg_core::config::IdentityConfig;

use super::error::IdentityError;
use super::types::{
    ApiEnvelope, DeviceToken, RegisterRequest, RegisterResult, RotatedCredentials, StatusResult,
    WireGuardResult,
};
use super::{IdentityApi, RegistrationRefresh};

/// Overall timeout applied to every identity request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token lifetime assumed when the service returns an unparsable expiry.
pub const DEFAULT_TOKEN_LIFETIME: TimeDelta = TimeDelta::hours(1);

const DEVICE_TYPE: &str = "router";

/// HTTP client plus the account-scoped base URL.
///
/// Cloning is cheap and shares the connection pool; it carries no token state.
#[derive(Debug, Clone)]
pub struct IdentityEndpoint {
    http: reqwest::Client,
    base_url: String,
}

impl IdentityEndpoint {
    /// Build the account-scoped URL for a given path.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Extend the device registration. Any status other than 200 is an error.
    pub async fn refresh_registration(&self, token: &str) -> Result<(), IdentityError> {
        let url = reqwest::Url::parse_with_params(
            &self.api_url("/devices/warp/refresh"),
            &[("device_token", token)],
        )
        .map_err(|e| IdentityError::Config(format!("invalid refresh URL: {e}")))?;

        let resp = self.http.post(url).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }

    /// Check status, then decode the `{success, result, errors}` envelope.
    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, IdentityError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown").into()
                } else {
                    body
                },
            });
        }

        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| IdentityError::Malformed {
                operation,
                message: e.to_string(),
            })?;
        if !envelope.success {
            return Err(IdentityError::Rejected {
                operation,
                message: envelope.error_summary(),
            });
        }
        envelope.result.ok_or_else(|| IdentityError::Malformed {
            operation,
            message: "missing result".into(),
        })
    }
}

#[async_trait]
impl RegistrationRefresh for IdentityEndpoint {
    async fn refresh_registration(&self, token: &str) -> Result<(), IdentityError> {
        Self::refresh_registration(self, token).await
    }
}

/// Identity service client with an in-memory device token cache.
pub struct IdentityClient {
    endpoint: IdentityEndpoint,
    client_id: String,
    client_secret: String,
    device_name: String,
    token: Option<DeviceToken>,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("device_name", &self.device_name)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl IdentityClient {
    /// Create a new identity client.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        if config.client_id.is_empty() {
            return Err(IdentityError::Config("client_id is empty".into()));
        }
        if config.client_secret.is_empty() {
            return Err(IdentityError::Config("client_secret is empty".into()));
        }
        if config.account_id.is_empty() {
            return Err(IdentityError::Config("account_id is empty".into()));
        }
        if config.api_base_url.is_empty() {
            return Err(IdentityError::Config("api_base_url is empty".into()));
        }

        // reqwest is built with rustls-no-provider; Err only means one is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let base_url = format!(
            "{}/accounts/{}",
            config.api_base_url.trim_end_matches('/'),
            config.account_id
        );
        Ok(Self {
            endpoint: IdentityEndpoint { http, base_url },
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            device_name: config.device_name.clone(),
            token: None,
        })
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        self.endpoint.api_url(path)
    }

    /// The cached token, if any, regardless of expiry.
    pub fn cached_token(&self) -> Option<&DeviceToken> {
        self.token.as_ref()
    }

    /// Return the cached token while it is valid; otherwise register again.
    pub async fn authenticate(&mut self) -> Result<DeviceToken, IdentityError> {
        let now = Utc::now();
        if let Some(token) = self.token.as_ref().filter(|t| t.is_valid_at(now)) {
            tracing::debug!(expires_at = %token.expires_at(), "Using cached device token");
            return Ok(token.clone());
        }

        let token = self.register().await?;
        self.token = Some(token.clone());
        Ok(token)
    }

    async fn register(&self) -> Result<DeviceToken, IdentityError> {
        let request = RegisterRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            device_name: &self.device_name,
            device_type: DEVICE_TYPE,
            warp_enabled: true,
        };
        let resp = self
            .endpoint
            .http
            .post(self.api_url("/devices/warp/register"))
            .json(&request)
            .send()
            .await?;
        let result: RegisterResult = IdentityEndpoint::decode(resp, "registration").await?;
        if result.token.is_empty() {
            return Err(IdentityError::Malformed {
                operation: "registration",
                message: "empty device token".into(),
            });
        }

        let expires_at = parse_expiry(&result.expires_at, Utc::now());
        tracing::info!(
            device_id = %result.device_id,
            %expires_at,
            "Registered device with identity service"
        );
        Ok(DeviceToken::new(result.token, expires_at))
    }

    /// Fetch the rotated WireGuard credentials for this device.
    pub async fn fetch_credentials(
        &self,
        token: &DeviceToken,
    ) -> Result<RotatedCredentials, IdentityError> {
        let resp = self
            .endpoint
            .http
            .get(self.api_url("/devices/warp/wireguard"))
            .bearer_auth(token.bearer())
            .send()
            .await?;
        let result: WireGuardResult = IdentityEndpoint::decode(resp, "credentials").await?;
        if let Some(rotation) = &result.rotation_expires_at {
            tracing::debug!(rotation_expires_at = %rotation, "Fetched rotated credentials");
        }
        Ok(result.into())
    }

    /// Whether the device is both active and WARP-enabled.
    pub async fn device_active(&self, token: &DeviceToken) -> Result<bool, IdentityError> {
        let resp = self
            .endpoint
            .http
            .get(self.api_url("/devices/warp/status"))
            .bearer_auth(token.bearer())
            .send()
            .await?;
        let result: StatusResult = IdentityEndpoint::decode(resp, "device status").await?;
        tracing::debug!(
            active = result.active,
            warp_enabled = result.warp_enabled,
            last_seen = result.last_seen.as_deref().unwrap_or("-"),
            "Device status"
        );
        Ok(result.active && result.warp_enabled)
    }

    /// Extend the device registration.
    pub async fn refresh_registration(&self, token: &str) -> Result<(), IdentityError> {
        self.endpoint.refresh_registration(token).await
    }
}

#[async_trait]
impl IdentityApi for IdentityClient {
    type Refresher = IdentityEndpoint;

    async fn authenticate(&mut self) -> Result<DeviceToken, IdentityError> {
        Self::authenticate(self).await
    }

    async fn fetch_credentials(
        &self,
        token: &DeviceToken,
    ) -> Result<RotatedCredentials, IdentityError> {
        Self::fetch_credentials(self, token).await
    }

    async fn device_active(&self, token: &DeviceToken) -> Result<bool, IdentityError> {
        Self::device_active(self, token).await
    }

    fn refresher(&self) -> IdentityEndpoint {
        self.endpoint.clone()
    }
}

/// Parse an RFC 3339 expiry, falling back to [`DEFAULT_TOKEN_LIFETIME`] from `now`.
pub(crate) fn parse_expiry(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(expires_at = raw, error = %e, "Unparsable token expiry, assuming one hour");
            now + DEFAULT_TOKEN_LIFETIME
        }
    }
}

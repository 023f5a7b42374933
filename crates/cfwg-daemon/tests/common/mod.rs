//! In-memory stand-ins for the identity service and systemd.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};

use cfwg_daemon::identity::{
    DeviceToken, IdentityApi, IdentityError, RegistrationRefresh, RotatedCredentials,
};
use cfwg_daemon::service::{CommandOutput, CommandRunner};

pub const UNIT: &str = "wg-quick@wg0";

pub fn credentials() -> RotatedCredentials {
    RotatedCredentials {
        private_key: "NEWPRIV=".into(),
        public_key: "NEWPUB=".into(),
        peer_public_key: "NEWPEER=".into(),
        peer_preshared_key: None,
        endpoint: "162.159.192.1".into(),
        endpoint_port: 2408,
        allowed_ips: vec!["0.0.0.0/0".into(), "::/0".into()],
        dns: vec!["1.1.1.1".into()],
    }
}

/// Counters shared between a [`FakeIdentity`] and the test body.
#[derive(Debug, Default)]
pub struct IdentityCounters {
    pub authenticated: AtomicUsize,
    pub fetched: AtomicUsize,
    pub refreshed: AtomicUsize,
}

impl IdentityCounters {
    pub fn authenticated(&self) -> usize {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    pub fn refreshed(&self) -> usize {
        self.refreshed.load(Ordering::SeqCst)
    }
}

pub struct FakeIdentity {
    pub counters: Arc<IdentityCounters>,
    pub fail_auth: bool,
    pub device_active: bool,
    pub credentials: RotatedCredentials,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(IdentityCounters::default()),
            fail_auth: false,
            device_active: true,
            credentials: credentials(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_auth: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    type Refresher = FakeRefresher;

    async fn authenticate(&mut self) -> Result<DeviceToken, IdentityError> {
        self.counters.authenticated.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth {
            return Err(IdentityError::Api {
                status: 401,
                message: "invalid client secret".into(),
            });
        }
        Ok(DeviceToken::new("tok-1", Utc::now() + TimeDelta::hours(1)))
    }

    async fn fetch_credentials(
        &self,
        _token: &DeviceToken,
    ) -> Result<RotatedCredentials, IdentityError> {
        self.counters.fetched.fetch_add(1, Ordering::SeqCst);
        Ok(self.credentials.clone())
    }

    async fn device_active(&self, _token: &DeviceToken) -> Result<bool, IdentityError> {
        Ok(self.device_active)
    }

    fn refresher(&self) -> FakeRefresher {
        FakeRefresher {
            counters: Arc::clone(&self.counters),
        }
    }
}

pub struct FakeRefresher {
    counters: Arc<IdentityCounters>,
}

#[async_trait]
impl RegistrationRefresh for FakeRefresher {
    async fn refresh_registration(&self, token: &str) -> Result<(), IdentityError> {
        assert_eq!(token, "tok-1");
        self.counters.refreshed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A single systemd unit that becomes active on `start` or `restart`.
#[derive(Debug, Default)]
pub struct FakeSystemd {
    active: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeSystemd {
    pub fn with_active(active: bool) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(active),
            calls: Mutex::default(),
        })
    }

    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| *c == command).count()
    }
}

impl CommandRunner for FakeSystemd {
    #[allow(clippy::unwrap_used)]
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{program} {}", args.join(" ")));

        let ok = |output: &str| CommandOutput {
            success: true,
            code: Some(0),
            output: output.to_string(),
        };
        match args.first().copied() {
            Some("is-active") if self.active.load(Ordering::SeqCst) => Ok(ok("active\n")),
            Some("is-active") => Ok(CommandOutput {
                success: false,
                code: Some(3),
                output: "inactive\n".into(),
            }),
            Some("start" | "restart") => {
                self.active.store(true, Ordering::SeqCst);
                Ok(ok(""))
            }
            Some("stop") => {
                self.active.store(false, Ordering::SeqCst);
                Ok(ok(""))
            }
            _ => Ok(ok("")),
        }
    }
}

//! The reconciliation loop.
//!
//! Each cycle authenticates, fetches rotated credentials, confirms the tunnel
//! service is in use, rewrites the tunnel file, and restarts the service.
//! Failures are retried after a short delay; repeated failures back off.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::identity::{DeviceToken, IdentityApi, RegistrationRefresh};
use crate::service::{ApplyAction, CommandRunner, ServiceController, SystemRunner};
use crate::wireguard::{TunnelConfigWriter, WriteOutcome};

use super::error::CycleError;
use super::policy::{FailureState, ReconcilePolicy};

/// Result of a completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub token: DeviceToken,
    pub write: WriteOutcome,
    pub action: ApplyAction,
}

/// Drives the tunnel file and service toward the identity service's credentials.
pub struct Reconciler<I, R = SystemRunner> {
    identity: I,
    writer: TunnelConfigWriter,
    service: ServiceController<R>,
    policy: ReconcilePolicy,
    failures: FailureState,
}

impl<I, R> Reconciler<I, R>
where
    I: IdentityApi,
    R: CommandRunner,
{
    pub fn new(
        identity: I,
        writer: TunnelConfigWriter,
        service: ServiceController<R>,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            identity,
            writer,
            service,
            policy,
            failures: FailureState::default(),
        }
    }

    pub const fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Current consecutive failure count.
    pub const fn failures(&self) -> u32 {
        self.failures.count()
    }

    /// Run one cycle. Steps run to completion; nothing here observes shutdown.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        info!("Authenticating with identity service");
        let token = self.identity.authenticate().await.map_err(CycleError::Auth)?;

        info!("Retrieving rotated tunnel credentials");
        let creds = self
            .identity
            .fetch_credentials(&token)
            .await
            .map_err(CycleError::Fetch)?;

        if self.writer.exists() {
            match self.service.is_active() {
                Ok(true) => {}
                Ok(false) => return Err(CycleError::ServiceInactive),
                Err(e) => return Err(CycleError::ServiceQuery(e)),
            }
        } else {
            info!(
                path = %self.writer.path().display(),
                "No tunnel configuration yet, rendering a fresh one"
            );
        }

        let write = self.writer.update(&creds).map_err(CycleError::Update)?;
        let action = self.service.apply().map_err(CycleError::Apply)?;

        Ok(CycleReport {
            token,
            write,
            action,
        })
    }

    /// Run cycles until `shutdown` flips.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("Reconciliation loop shutting down");
                return;
            }

            if let Some(delay) = self.policy.backoff_for(self.failures.count()) {
                warn!(
                    failures = self.failures.count(),
                    delay_secs = delay.as_secs(),
                    "Too many consecutive failures, backing off"
                );
                if !sleep_or_shutdown(delay, &mut shutdown).await {
                    return;
                }
                self.failures.after_backoff(&self.policy);
            }

            let delay = match self.run_cycle().await {
                Ok(report) => {
                    self.failures.reset();
                    info!(
                        mode = ?report.write.mode,
                        action = %report.action,
                        next_in_secs = self.policy.interval.as_secs(),
                        "Tunnel credentials updated and applied"
                    );
                    self.spawn_registration_refresh(report.token);
                    self.policy.interval
                }
                Err(e) if !e.counts_as_failure() => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.policy.inactive_service_delay.as_secs(),
                        "Tunnel service is not running; it may have been disabled in the management UI"
                    );
                    self.policy.inactive_service_delay
                }
                Err(e) => {
                    let failures = self.failures.record_failure();
                    error!(
                        error = %e,
                        retry_in_secs = self.policy.retry_delay.as_secs(),
                        "Reconciliation failed (failure {failures}/{})",
                        self.policy.max_consecutive_failures
                    );
                    self.policy.retry_delay
                }
            };

            if !sleep_or_shutdown(delay, &mut shutdown).await {
                return;
            }
        }
    }

    /// Extend the registration halfway through the interval. Only logged.
    fn spawn_registration_refresh(&self, token: DeviceToken) {
        let refresher = self.identity.refresher();
        let delay = self.policy.refresh_delay();
        tokio::spawn(async move {
            sleep(delay).await;
            match refresher.refresh_registration(token.bearer()).await {
                Ok(()) => info!("Refreshed device registration"),
                Err(e) => warn!(error = %e, "Failed to refresh device registration"),
            }
        });
    }
}

/// Sleep for `delay` unless shutdown is signalled first. Returns `false` on shutdown.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = sleep(delay) => true,
        _ = shutdown.changed() => {
            info!("Reconciliation loop shutting down during wait");
            false
        }
    }
}

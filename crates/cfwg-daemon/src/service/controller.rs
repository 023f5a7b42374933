//! `systemctl` wrapper for the tunnel unit.

use std::path::Path;

use super::error::ServiceError;
use super::runner::{CommandOutput, CommandRunner, SystemRunner};

const SYSTEMCTL: &str = "systemctl";

/// Present on UniFi Dream Machine firmware.
const UDM_MARKER: &str = "/usr/bin/ubnt-systool";

/// Whether this host looks like a UniFi Dream Machine.
pub fn looks_like_udm() -> bool {
    Path::new(UDM_MARKER).exists()
}

/// Which transition [`ServiceController::apply`] performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Started,
    Restarted,
}

impl ApplyAction {
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Started => "start",
            Self::Restarted => "restart",
        }
    }
}

impl std::fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// Controls one systemd unit.
#[derive(Debug, Clone)]
pub struct ServiceController<R = SystemRunner> {
    unit: String,
    runner: R,
}

impl ServiceController<SystemRunner> {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_runner(unit, SystemRunner)
    }
}

impl<R: CommandRunner> ServiceController<R> {
    pub fn with_runner(unit: impl Into<String>, runner: R) -> Self {
        Self {
            unit: unit.into(),
            runner,
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    fn exec(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        self.runner
            .run(program, args)
            .map_err(|source| ServiceError::Spawn {
                command: format!("{program} {}", args.join(" ")),
                source,
            })
    }

    fn systemctl(&self, verb: &str) -> Result<(), ServiceError> {
        let out = self.exec(SYSTEMCTL, &[verb, &self.unit])?;
        if !out.success {
            let command = format!("{SYSTEMCTL} {verb} {}", self.unit);
            tracing::error!(command, output = out.trimmed(), "Service command failed");
            return Err(ServiceError::Command {
                command,
                code: out.code_display(),
                output: out.trimmed().to_string(),
            });
        }
        Ok(())
    }

    /// `true` when the unit reports `active`; `inactive` and `unknown` are `false`.
    pub fn is_active(&self) -> Result<bool, ServiceError> {
        let out = self.exec(SYSTEMCTL, &["is-active", &self.unit])?;
        let state = out.trimmed();
        if out.success {
            return Ok(state == "active");
        }
        match state {
            "inactive" | "unknown" => Ok(false),
            _ => Err(ServiceError::UnexpectedState {
                unit: self.unit.clone(),
                output: state.to_string(),
            }),
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        tracing::info!(unit = %self.unit, "Starting tunnel service");
        self.systemctl("start")
    }

    pub fn stop(&self) -> Result<(), ServiceError> {
        tracing::info!(unit = %self.unit, "Stopping tunnel service");
        self.systemctl("stop")
    }

    pub fn restart(&self) -> Result<(), ServiceError> {
        tracing::info!(unit = %self.unit, "Restarting tunnel service");
        self.systemctl("restart")
    }

    /// Restart the unit if it is running, start it otherwise, then confirm it is active.
    pub fn apply(&self) -> Result<ApplyAction, ServiceError> {
        let action = if self.is_active()? {
            self.restart()?;
            ApplyAction::Restarted
        } else {
            self.start()?;
            ApplyAction::Started
        };

        if !self.is_active()? {
            return Err(ServiceError::NotActiveAfter {
                unit: self.unit.clone(),
                action: action.verb(),
            });
        }
        Ok(action)
    }

    /// Check that the WireGuard tools are installed and the names are configured.
    pub fn preflight(&self, interface_name: &str) -> Result<(), ServiceError> {
        for tool in ["wg", "wg-quick"] {
            let found = self
                .runner
                .run("which", &[tool])
                .is_ok_and(|out| out.success);
            if !found {
                return Err(ServiceError::Preflight(format!(
                    "WireGuard '{tool}' command not found"
                )));
            }
        }
        if interface_name.trim().is_empty() {
            return Err(ServiceError::Preflight(
                "tunnel interface name not configured".into(),
            ));
        }
        if self.unit.trim().is_empty() {
            return Err(ServiceError::Preflight("service unit name not configured".into()));
        }
        Ok(())
    }
}

//! First-run helpers: default config template, interactive wizard, and the
//! placeholder tunnel file for import into the management UI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password};

use cfwg_core::Config;
use cfwg_core::backup::write_atomic;
use cfwg_core::config::{DEFAULT_CONFIG_PATH, default_config_text, parse_config, save_config};

use crate::wireguard::placeholder_config;

/// File name of the placeholder tunnel config written next to the daemon config.
pub const PLACEHOLDER_FILE_NAME: &str = "dummy-wireguard.conf";

/// Files produced by a setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Written {
        config: PathBuf,
        /// Set when the placeholder file was created by this run.
        placeholder: Option<PathBuf>,
    },
    Aborted,
}

/// Target path for `setup` and `config-wizard`.
pub fn target_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf)
}

/// Placeholder path for a config at `config_path`.
pub fn placeholder_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(PLACEHOLDER_FILE_NAME)
}

/// Ask before replacing an existing file unless `assume_yes`.
pub fn confirm_overwrite(path: &Path, assume_yes: bool) -> Result<bool> {
    if assume_yes || !path.exists() {
        return Ok(true);
    }
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Configuration file already exists at {}. Overwrite it?",
            path.display()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    Ok(())
}

/// Write the placeholder tunnel file next to `config_path` if it is not already there.
pub fn write_placeholder(config_path: &Path) -> Result<Option<PathBuf>> {
    let path = placeholder_path(config_path);
    if path.exists() {
        return Ok(None);
    }
    write_atomic(&path, &placeholder_config())
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote placeholder tunnel configuration");
    Ok(Some(path))
}

/// Write the commented default configuration to `path`.
pub fn run_setup(path: &Path, assume_yes: bool) -> Result<SetupOutcome> {
    if !confirm_overwrite(path, assume_yes)? {
        return Ok(SetupOutcome::Aborted);
    }
    ensure_parent(path)?;
    write_atomic(path, default_config_text())
        .with_context(|| format!("failed to write {}", path.display()))?;
    let placeholder = write_placeholder(path)?;
    Ok(SetupOutcome::Written {
        config: path.to_path_buf(),
        placeholder,
    })
}

/// Interactively build a configuration and save it to `path`.
pub fn run_wizard(path: &Path, assume_yes: bool) -> Result<SetupOutcome> {
    if !confirm_overwrite(path, assume_yes)? {
        return Ok(SetupOutcome::Aborted);
    }
    let base = std::fs::read_to_string(path)
        .ok()
        .and_then(|text| parse_config(&text).ok())
        .unwrap_or_default();
    let config = prompt_config(base)?;

    ensure_parent(path)?;
    save_config(&config, path).with_context(|| format!("failed to save {}", path.display()))?;
    let placeholder = write_placeholder(path)?;
    Ok(SetupOutcome::Written {
        config: path.to_path_buf(),
        placeholder,
    })
}

fn input(prompt: &str, default: &str) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if !default.is_empty() {
        input = input.default(default.to_string());
    }
    Ok(input.interact_text()?)
}

/// Prompt for every setting, offering the values in `base` as defaults.
pub fn prompt_config(base: Config) -> Result<Config> {
    let mut config = base;

    config.identity.client_id = input("Service token client ID", &config.identity.client_id)?;
    let secret: String = Password::new()
        .with_prompt("Service token client secret (leave empty to keep current)")
        .allow_empty_password(true)
        .interact()?;
    if !secret.is_empty() {
        config.identity.client_secret = secret;
    }
    config.identity.team_name = input("Team name", &config.identity.team_name)?;
    config.identity.account_id = input("Account ID", &config.identity.account_id)?;
    config.identity.device_name = input("Device name", &config.identity.device_name)?;

    let interface = input("Tunnel interface name", &config.tunnel.interface_name)?;
    if interface != config.tunnel.interface_name {
        let (path, unit) = defaults_for_interface(&interface);
        config.tunnel.config_path = path;
        config.service.unit_name = unit;
    }
    config.tunnel.interface_name = interface;
    config.tunnel.config_path = PathBuf::from(input(
        "Tunnel configuration file",
        &config.tunnel.config_path.to_string_lossy(),
    )?);
    config.service.unit_name = input("Tunnel service unit", &config.service.unit_name)?;
    config.service.backup_dir = PathBuf::from(input(
        "Backup directory",
        &config.service.backup_dir.to_string_lossy(),
    )?);

    config.refresh_interval_minutes = Input::new()
        .with_prompt("Refresh interval (minutes)")
        .default(config.refresh_interval_minutes)
        .interact_text()?;
    config.debug = Confirm::new()
        .with_prompt("Enable debug logging?")
        .default(config.debug)
        .interact()?;

    config
        .validate()
        .context("the entered configuration is incomplete")?;
    Ok(config)
}

/// Tunnel file path and service unit conventionally used for `interface`.
pub fn defaults_for_interface(interface: &str) -> (PathBuf, String) {
    (
        PathBuf::from(format!("/etc/wireguard/{interface}.conf")),
        format!("wg-quick@{interface}"),
    )
}

/// Operator instructions printed after a successful setup.
pub fn next_steps(config_path: &Path) -> String {
    let placeholder = placeholder_path(config_path);
    format!(
        "Next steps:\n\
         1. Make sure a WireGuard configuration exists in the management UI.\n   \
         If not, import {placeholder} (Settings > VPN > WireGuard > Create New > Import).\n   \
         It contains temporary keys that the daemon replaces on its first cycle.\n\
         2. Start the daemon with: cfwg --config {config} start",
        placeholder = placeholder.display(),
        config = config_path.display(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::wireguard::inspect;

    #[test]
    fn target_defaults_to_system_path() {
        assert_eq!(target_path(None), PathBuf::from("/etc/cfwg-zt/config.toml"));
        assert_eq!(
            target_path(Some(Path::new("/tmp/c.toml"))),
            PathBuf::from("/tmp/c.toml")
        );
    }

    #[test]
    fn setup_writes_template_and_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfwg").join("config.toml");

        let outcome = run_setup(&path, true).unwrap();

        let SetupOutcome::Written {
            config,
            placeholder,
        } = outcome
        else {
            panic!("setup aborted");
        };
        assert_eq!(config, path);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            default_config_text()
        );
        let placeholder = placeholder.unwrap();
        assert_eq!(placeholder, dir.path().join("cfwg").join(PLACEHOLDER_FILE_NAME));
        let report = inspect(&std::fs::read_to_string(placeholder).unwrap());
        assert!(report.has_placeholder_keys);
    }

    #[test]
    fn setup_with_yes_overwrites_but_keeps_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "old = true\n").unwrap();
        std::fs::write(placeholder_path(&path), "operator edited\n").unwrap();

        let outcome = run_setup(&path, true).unwrap();

        assert!(matches!(
            outcome,
            SetupOutcome::Written {
                placeholder: None,
                ..
            }
        ));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            default_config_text()
        );
        assert_eq!(
            std::fs::read_to_string(placeholder_path(&path)).unwrap(),
            "operator edited\n"
        );
    }

    #[test]
    fn interface_defaults_follow_name() {
        let (path, unit) = defaults_for_interface("wg1");
        assert_eq!(path, PathBuf::from("/etc/wireguard/wg1.conf"));
        assert_eq!(unit, "wg-quick@wg1");
    }

    #[test]
    fn next_steps_mention_both_paths() {
        let steps = next_steps(Path::new("/etc/cfwg-zt/config.toml"));
        assert!(steps.contains("/etc/cfwg-zt/dummy-wireguard.conf"));
        assert!(steps.contains("--config /etc/cfwg-zt/config.toml start"));
    }
}

// CLI configuration
// Validated settings built from parsed arguments, before any process is spawned

use std::path::PathBuf;
use std::time::Duration;
use vmate_core::application::{ProbeConfig, SupervisorConfig};
use vmate_core::{AppError, Result};

pub const DEFAULT_HISTORY_PATH: &str = "~/.vmate/recent.txt";
pub const DEFAULT_CONFIG_DIR: &str = "~/Downloads";

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

/// Settings for a batch probe run
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub dir: PathBuf,
    pub modify: bool,
    pub probe: ProbeConfig,
}

impl ProbeSettings {
    pub fn new(
        dir: &str,
        limit: usize,
        timeout_secs: u64,
        max_workers: usize,
        modify: bool,
        client_binary: &str,
    ) -> Result<Self> {
        if max_workers == 0 {
            return Err(AppError::Validation("--max must be at least 1".to_string()));
        }
        if timeout_secs == 0 {
            return Err(AppError::Validation(
                "--timeout must be at least 1 second".to_string(),
            ));
        }
        validate_binary(client_binary)?;

        Ok(Self {
            dir: expand_path(dir),
            modify,
            probe: ProbeConfig {
                max_workers,
                success_limit: limit,
                per_probe_timeout: Duration::from_secs(timeout_secs),
                client_binary: client_binary.to_string(),
            },
        })
    }
}

/// Settings for a persistent connection
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub config_path: PathBuf,
    pub supervisor: SupervisorConfig,
}

impl ConnectSettings {
    pub fn new(
        config_path: &str,
        establish_timeout_secs: u64,
        client_binary: &str,
    ) -> Result<Self> {
        if establish_timeout_secs == 0 {
            return Err(AppError::Validation(
                "--establish-timeout must be at least 1 second".to_string(),
            ));
        }
        validate_binary(client_binary)?;

        let config_path = expand_path(config_path);
        if !config_path.is_file() {
            return Err(AppError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        }

        Ok(Self {
            config_path,
            supervisor: SupervisorConfig {
                establish_timeout: Duration::from_secs(establish_timeout_secs),
                client_binary: client_binary.to_string(),
            },
        })
    }
}

fn validate_binary(client_binary: &str) -> Result<()> {
    if client_binary.trim().is_empty() {
        return Err(AppError::Validation(
            "--openvpn-bin must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_settings_valid() {
        let settings = ProbeSettings::new("/tmp/vpn", 5, 10, 20, true, "openvpn").unwrap();
        assert_eq!(settings.dir, PathBuf::from("/tmp/vpn"));
        assert!(settings.modify);
        assert_eq!(settings.probe.success_limit, 5);
        assert_eq!(settings.probe.max_workers, 20);
        assert_eq!(settings.probe.per_probe_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ProbeSettings::new("/tmp", 5, 10, 0, false, "openvpn").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(ProbeSettings::new("/tmp", 5, 0, 10, false, "openvpn").is_err());
    }

    #[test]
    fn test_zero_limit_allowed() {
        // Nothing is probed, but it is not an error
        let settings = ProbeSettings::new("/tmp", 0, 10, 10, false, "openvpn").unwrap();
        assert_eq!(settings.probe.success_limit, 0);
    }

    #[test]
    fn test_connect_requires_existing_file() {
        let err = ConnectSettings::new("/nonexistent/a.ovpn", 5, "openvpn").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_connect_zero_timeout_rejected() {
        assert!(ConnectSettings::new("/nonexistent/a.ovpn", 0, "openvpn").is_err());
    }
}

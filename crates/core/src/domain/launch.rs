// Launch specification for the external tunnel client

/// Default client executable (looked up on PATH)
pub const DEFAULT_CLIENT_BINARY: &str = "openvpn";

/// How a candidate is brought up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Non-intrusive test: no routes, no interface config, no bind
    Probe,
    /// Real connection
    Connect,
}

/// Executable plus argument vector for one launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub mode: LaunchMode,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, config_path: &str, mode: LaunchMode) -> Self {
        let mut args = vec!["--config".to_string(), config_path.to_string()];
        if mode == LaunchMode::Probe {
            args.extend(
                ["--route-noexec", "--ifconfig-noexec", "--nobind", "--auth-nocache"]
                    .iter()
                    .map(|a| a.to_string()),
            );
        }
        Self {
            program: program.into(),
            args,
            mode,
        }
    }

    pub fn probe(program: impl Into<String>, config_path: &str) -> Self {
        Self::new(program, config_path, LaunchMode::Probe)
    }

    pub fn connect(program: impl Into<String>, config_path: &str) -> Self {
        Self::new(program, config_path, LaunchMode::Connect)
    }

    /// Config path this launch refers to
    pub fn config_path(&self) -> &str {
        self.args.get(1).map(String::as_str).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_args_disable_side_effects() {
        let spec = LaunchSpec::probe("openvpn", "/tmp/a.ovpn");
        assert_eq!(
            spec.args,
            vec![
                "--config",
                "/tmp/a.ovpn",
                "--route-noexec",
                "--ifconfig-noexec",
                "--nobind",
                "--auth-nocache"
            ]
        );
        assert_eq!(spec.config_path(), "/tmp/a.ovpn");
    }

    #[test]
    fn test_connect_args() {
        let spec = LaunchSpec::connect("openvpn", "/tmp/a.ovpn");
        assert_eq!(spec.args, vec!["--config", "/tmp/a.ovpn"]);
        assert_eq!(spec.mode, LaunchMode::Connect);
    }
}

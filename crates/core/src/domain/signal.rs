// Signal vocabulary recognised in client output

/// Printed by OpenVPN once the tunnel is fully up
pub const SUCCESS_PHRASE: &str = "Initialization Sequence Completed";

/// Printed by OpenVPN when it enters its own reconnect loop
pub const RESTART_PHRASE: &str = "Restart pause";

/// Substrings that mark a failed or dying tunnel
pub const FAILURE_KEYWORDS: [&str; 19] = [
    "No route to host",
    "TLS key negotiation failed",
    "Connection timed out",
    "Connection refused",
    "AUTH_FAILED",
    "Network unreachable",
    "Host is down",
    "Name or service not known",
    "VERIFY ERROR",
    "certificate verify failed",
    "Inactivity timeout",
    "Ping timeout",
    "Cannot open TUN/TAP dev",
    "write to TUN/TAP: Input/output error",
    "read: Connection reset by peer",
    "handshake failure",
    "fatal error",
    "process exiting",
    "killed",
];

/// What a single line of output means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSignal {
    Success,
    Failure(String),
    RestartPause,
}

/// Fixed set of phrases the classifier looks for
#[derive(Debug, Clone)]
pub struct SignalVocabulary {
    success_phrase: String,
    restart_phrase: String,
    failure_keywords: Vec<String>,
}

impl SignalVocabulary {
    pub fn new(
        success_phrase: impl Into<String>,
        restart_phrase: impl Into<String>,
        failure_keywords: Vec<String>,
    ) -> Self {
        Self {
            success_phrase: success_phrase.into(),
            restart_phrase: restart_phrase.into(),
            failure_keywords,
        }
    }

    /// Match one (already trimmed) line
    ///
    /// The success phrase is checked before the failure keywords, so a line
    /// carrying both counts as success. `watch_restart` enables the restart
    /// phrase, which only matters while holding a connection.
    pub fn match_line(&self, line: &str, watch_restart: bool) -> Option<LineSignal> {
        if line.contains(&self.success_phrase) {
            return Some(LineSignal::Success);
        }
        if let Some(keyword) = self
            .failure_keywords
            .iter()
            .find(|k| line.contains(k.as_str()))
        {
            return Some(LineSignal::Failure(keyword.clone()));
        }
        if watch_restart && line.contains(&self.restart_phrase) {
            return Some(LineSignal::RestartPause);
        }
        None
    }

    pub fn failure_keywords(&self) -> &[String] {
        &self.failure_keywords
    }
}

impl Default for SignalVocabulary {
    fn default() -> Self {
        Self::new(
            SUCCESS_PHRASE,
            RESTART_PHRASE,
            FAILURE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        )
    }
}

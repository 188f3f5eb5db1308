// Candidate Domain Model

use serde::{Deserialize, Serialize};

/// Sentinel persisted when the lookup could not be performed
pub const LOCATION_UNKNOWN: &str = "UNKNOWN";

/// Sentinel persisted when the lookup service answered with a non-200 status
pub const LOCATION_API_ERROR: &str = "ERR_API";

const LOCATION_PENDING: &str = "PENDING";

/// Network location of a candidate's remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    /// Not resolved yet (only successful probes get resolved)
    Pending,
    /// ISO country code reported by the lookup service
    Country(String),
    Unknown,
    ApiError,
}

impl Location {
    /// Parse the persisted field back into a location
    ///
    /// Anything that is not a known sentinel is taken as a country code.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | LOCATION_UNKNOWN => Location::Unknown,
            LOCATION_API_ERROR => Location::ApiError,
            LOCATION_PENDING => Location::Pending,
            code => Location::Country(code.to_string()),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Pending => write!(f, "{}", LOCATION_PENDING),
            Location::Country(code) => write!(f, "{}", code),
            Location::Unknown => write!(f, "{}", LOCATION_UNKNOWN),
            Location::ApiError => write!(f, "{}", LOCATION_API_ERROR),
        }
    }
}

/// One testable VPN configuration
///
/// Identified by its filesystem path; the location is only meaningful after
/// a successful probe or connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    pub location: Location,
}

impl Candidate {
    /// Create an unresolved candidate
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            location: Location::Pending,
        }
    }

    /// Create a candidate with a known location (e.g. loaded from history)
    pub fn with_location(path: impl Into<String>, location: Location) -> Self {
        Self {
            path: path.into(),
            location,
        }
    }

    /// Copy of this candidate annotated with a resolved location
    pub fn located(&self, location: Location) -> Self {
        Self {
            path: self.path.clone(),
            location,
        }
    }

    /// File name of the config, used for user-facing messages
    pub fn display_name(&self) -> &str {
        std::path::Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }

    /// True if this candidate refers to the given path (surrounding whitespace ignored)
    pub fn matches_path(&self, path: &str) -> bool {
        self.path.trim() == path.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse_sentinels() {
        assert_eq!(Location::parse("UNKNOWN"), Location::Unknown);
        assert_eq!(Location::parse("ERR_API"), Location::ApiError);
        assert_eq!(Location::parse("PENDING"), Location::Pending);
        assert_eq!(Location::parse(""), Location::Unknown);
        assert_eq!(Location::parse(" JP "), Location::Country("JP".to_string()));
    }

    #[test]
    fn test_location_display_matches_persisted_form() {
        assert_eq!(Location::Unknown.to_string(), "UNKNOWN");
        assert_eq!(Location::ApiError.to_string(), "ERR_API");
        assert_eq!(Location::Country("DE".into()).to_string(), "DE");
    }

    #[test]
    fn test_display_name_and_path_match() {
        let c = Candidate::new("/home/u/Downloads/vpngate_jp_01.ovpn");
        assert_eq!(c.display_name(), "vpngate_jp_01.ovpn");
        assert!(c.matches_path("  /home/u/Downloads/vpngate_jp_01.ovpn\n"));
        assert_eq!(c.location, Location::Pending);

        let located = c.located(Location::Country("JP".into()));
        assert_eq!(located.path, c.path);
        assert_eq!(located.location, Location::Country("JP".into()));
    }
}

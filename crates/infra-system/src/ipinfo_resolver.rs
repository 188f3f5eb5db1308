// ipinfo.io location resolver
// reason: reqwest for the HTTP lookup, tokio for file IO and DNS
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use vmate_core::domain::Location;
use vmate_core::port::LocationResolver;

/// Public lookup endpoint
pub const DEFAULT_IPINFO_BASE_URL: &str = "https://api.ipinfo.io";

/// Per-request timeout for the lookup service
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct LiteResponse {
    #[serde(default)]
    country_code: String,
}

/// Resolves a config's `remote` host to a country via ipinfo's lite API
pub struct IpInfoResolver {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl IpInfoResolver {
    pub fn new(token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_IPINFO_BASE_URL.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Point at a different service root (self-hosted mirror, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn lookup_url(&self, ip: &IpAddr) -> String {
        match &self.token {
            Some(token) => format!("{}/lite/{}?token={}", self.base_url, ip, token),
            None => format!("{}/lite/{}", self.base_url, ip),
        }
    }

    async fn query(&self, ip: IpAddr) -> Location {
        let response = match self.client.get(self.lookup_url(&ip)).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Location lookup request failed");
                return Location::Unknown;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!(ip = %ip, status = %response.status(), "Location service rejected lookup");
            return Location::ApiError;
        }

        match response.json::<LiteResponse>().await {
            Ok(body) if !body.country_code.trim().is_empty() => {
                Location::Country(body.country_code.trim().to_string())
            }
            Ok(_) => Location::Unknown,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Location response was not valid JSON");
                Location::Unknown
            }
        }
    }
}

#[async_trait]
impl LocationResolver for IpInfoResolver {
    async fn resolve(&self, config_path: &str) -> Location {
        let contents = match tokio::fs::read_to_string(config_path).await {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %config_path, error = %e, "Cannot read config for location lookup");
                return Location::Unknown;
            }
        };

        let Some(host) = parse_remote_host(&contents) else {
            debug!(path = %config_path, "No remote directive in config");
            return Location::Unknown;
        };

        let ip = match resolve_host(host).await {
            Some(ip) => ip,
            None => {
                warn!(path = %config_path, host = %host, "Cannot resolve remote host");
                return Location::Unknown;
            }
        };

        self.query(ip).await
    }
}

/// Host of the first `remote` directive
///
/// Only an exact `remote` keyword counts; `remote-cert-tls` and friends are
/// different directives.
pub fn parse_remote_host(contents: &str) -> Option<&str> {
    contents.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("remote"), Some(host)) => Some(host),
            _ => None,
        }
    })
}

async fn resolve_host(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    tokio::net::lookup_host((host, 0))
        .await
        .ok()?
        .next()
        .map(|addr| addr.ip())
}

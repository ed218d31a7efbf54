use std::fmt;

use chanline_api::{ProxyEndpoint, ProxyScheme};
use secrecy::{ExposeSecret, SecretString};

/// Username and secret for an authenticating proxy.
#[derive(Debug, Clone)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: SecretString,
}

impl PartialEq for ProxyCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl Eq for ProxyCredentials {}

/// User-facing proxy settings. Not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub scheme: ProxyScheme,
    pub host: String,
    /// Wider than `u16` so out-of-range input reaches validation.
    pub port: u32,
    pub credentials: Option<ProxyCredentials>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: ProxyScheme::Http,
            host: String::new(),
            port: 8080,
            credentials: None,
        }
    }
}

impl ProxyConfig {
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }
}

/// Where outbound stream fetches go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResolvedRoute {
    #[default]
    Direct,
    Proxied(ProxyEndpoint),
}

impl ResolvedRoute {
    pub fn endpoint(&self) -> Option<&ProxyEndpoint> {
        match self {
            Self::Direct => None,
            Self::Proxied(endpoint) => Some(endpoint),
        }
    }
}

impl fmt::Display for ResolvedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Proxied(endpoint) => f.write_str(&endpoint.redacted_url()),
        }
    }
}

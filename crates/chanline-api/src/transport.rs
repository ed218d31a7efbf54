// Shared transport configuration for building reqwest::Client instances.
//
// The network prober and the proxy route checker share timeout and proxy
// settings through this module, avoiding duplicated builder logic.

use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Proxy protocol spoken between the client and the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
}

impl ProxyScheme {
    pub const ALL: [Self; 3] = [Self::Http, Self::Https, Self::Socks5];

    /// URL scheme used when addressing the proxy itself.
    ///
    /// SOCKS5 uses `socks5h` so hostname resolution happens on the proxy.
    pub fn url_scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks5 => "socks5h",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks5 => "socks5",
        })
    }
}

/// A validated proxy endpoint, ready to be handed to an HTTP client or
/// the transcode engine.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl ProxyEndpoint {
    /// Proxy URL without credentials, safe for logs.
    pub fn redacted_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.url_host(), self.port)
    }

    /// Proxy URL with embedded credentials, for consumers that only take a
    /// single URL (ffmpeg's `http_proxy` environment variable).
    pub fn credentialed_url(&self) -> Result<url::Url, Error> {
        let base = format!(
            "{}://{}:{}",
            self.scheme.url_scheme(),
            self.url_host(),
            self.port
        );
        let mut url = url::Url::parse(&base)?;
        if let Some(ref username) = self.username {
            url.set_username(username)
                .map_err(|()| Error::InvalidProxy("username not representable".into()))?;
            if let Some(ref password) = self.password {
                url.set_password(Some(password.expose_secret()))
                    .map_err(|()| Error::InvalidProxy("password not representable".into()))?;
            }
        }
        Ok(url)
    }

    /// Build a `reqwest::Proxy` routing all traffic through this endpoint.
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy, Error> {
        let url = format!(
            "{}://{}:{}",
            self.scheme.url_scheme(),
            self.url_host(),
            self.port
        );
        let mut proxy = reqwest::Proxy::all(&url)
            .map_err(|e| Error::InvalidProxy(format!("{}: {e}", self.redacted_url())))?;

        if let Some(ref username) = self.username {
            let password = self
                .password
                .as_ref()
                .map_or("", |p| p.expose_secret());
            proxy = proxy.basic_auth(username, password);
        }

        Ok(proxy)
    }

    fn url_host(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl PartialEq for ProxyEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.host == other.host
            && self.port == other.port
            && self.username == other.username
            && self.password.as_ref().map(ExposeSecret::expose_secret)
                == other.password.as_ref().map(ExposeSecret::expose_secret)
    }
}

impl Eq for ProxyEndpoint {}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<ProxyEndpoint>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            proxy: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Without an explicit proxy the client ignores `HTTP_PROXY` and friends,
    /// so a direct route really is direct.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("chanline/", env!("CARGO_PKG_VERSION")));

        builder = match self.proxy {
            Some(ref endpoint) => builder.proxy(endpoint.to_reqwest()?),
            None => builder.no_proxy(),
        };

        builder
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}

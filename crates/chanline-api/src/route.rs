// Proxy connectivity checks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{ProxyEndpoint, TransportConfig};

/// Verifies that traffic can flow through a candidate proxy.
#[async_trait]
pub trait RouteChecker: Send + Sync {
    async fn check(&self, proxy: &ProxyEndpoint) -> Result<(), Error>;
}

/// Issues one lightweight request to `probe_url` through the proxy.
///
/// Any answer from the far side counts as a working route; 407 and
/// gateway errors generated by the proxy itself do not.
#[derive(Debug, Clone)]
pub struct HttpRouteChecker {
    probe_url: Url,
    timeout: Duration,
}

impl HttpRouteChecker {
    pub fn new(probe_url: Url, timeout: Duration) -> Self {
        Self { probe_url, timeout }
    }
}

#[async_trait]
impl RouteChecker for HttpRouteChecker {
    async fn check(&self, proxy: &ProxyEndpoint) -> Result<(), Error> {
        let transport = TransportConfig {
            timeout: self.timeout,
            connect_timeout: self.timeout,
            proxy: Some(proxy.clone()),
        };
        let client = transport.build_client()?;

        let resp = match client.head(self.probe_url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_connect() => return Err(Error::ProxyConnect(e.to_string())),
            Err(e) if e.is_timeout() => {
                return Err(Error::Timeout {
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            Err(e) => return Err(Error::Transport(e)),
        };

        let status = resp.status();
        debug!(proxy = %proxy.redacted_url(), %status, "route check answered");
        match status {
            StatusCode::PROXY_AUTHENTICATION_REQUIRED => Err(Error::ProxyAuthRequired),
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => Err(Error::ProxyRejected {
                status: status.as_u16(),
            }),
            _ => Ok(()),
        }
    }
}

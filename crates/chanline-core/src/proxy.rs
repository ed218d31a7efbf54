// ── Proxy path resolution ──
//
// Validates a proxy configuration, proves the route works, and publishes
// it atomically. A rejected configuration never replaces the applied one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chanline_api::{ProxyEndpoint, ProxyScheme, RouteChecker};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::model::{ProxyConfig, ResolvedRoute};

#[derive(Debug)]
struct Applied {
    config: ProxyConfig,
    route: ResolvedRoute,
}

/// Holds the applied proxy configuration and the route derived from it.
///
/// Cheaply cloneable. Reads are lock-free; applies are serialized.
#[derive(Clone)]
pub struct ProxyResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    checker: Arc<dyn RouteChecker>,
    /// Schemes the transcode engine can fetch sources through.
    schemes: &'static [ProxyScheme],
    applied: ArcSwap<Applied>,
    route_tx: watch::Sender<ResolvedRoute>,
    apply_lock: Mutex<()>,
}

impl ProxyResolver {
    pub fn new(checker: Arc<dyn RouteChecker>, schemes: &'static [ProxyScheme]) -> Self {
        let (route_tx, _) = watch::channel(ResolvedRoute::Direct);
        Self {
            inner: Arc::new(ResolverInner {
                checker,
                schemes,
                applied: ArcSwap::from_pointee(Applied {
                    config: ProxyConfig::default(),
                    route: ResolvedRoute::Direct,
                }),
                route_tx,
                apply_lock: Mutex::new(()),
            }),
        }
    }

    /// Validate and probe `config` without applying it.
    pub async fn resolve(&self, config: &ProxyConfig) -> Result<ResolvedRoute, ProxyError> {
        let Some(endpoint) = validate(config)? else {
            return Ok(ResolvedRoute::Direct);
        };
        if !self.inner.schemes.contains(&endpoint.scheme) {
            return Err(ProxyError::InvalidConfig(format!(
                "{} proxies are not supported by the transcode engine",
                endpoint.scheme
            )));
        }

        debug!(proxy = %endpoint.redacted_url(), "checking proxy route");
        self.inner
            .checker
            .check(&endpoint)
            .await
            .map_err(ProxyError::from)?;
        Ok(ResolvedRoute::Proxied(endpoint))
    }

    /// Resolve and, on success, atomically make `config` the applied one.
    pub async fn apply(&self, config: ProxyConfig) -> Result<ResolvedRoute, ProxyError> {
        let _guard = self.inner.apply_lock.lock().await;

        let route = match self.resolve(&config).await {
            Ok(route) => route,
            Err(e) => {
                warn!(error = %e, "proxy configuration rejected, keeping previous route");
                return Err(e);
            }
        };

        self.inner.applied.store(Arc::new(Applied {
            config,
            route: route.clone(),
        }));
        self.inner.route_tx.send_if_modified(|current| {
            if *current == route {
                false
            } else {
                *current = route.clone();
                true
            }
        });
        info!(route = %route, "proxy route applied");
        Ok(route)
    }

    /// Reset to a disabled proxy (direct route). Never fails.
    pub async fn clear(&self) -> ResolvedRoute {
        self.apply(ProxyConfig::default())
            .await
            .unwrap_or(ResolvedRoute::Direct)
    }

    pub fn config(&self) -> ProxyConfig {
        self.inner.applied.load().config.clone()
    }

    pub fn route(&self) -> ResolvedRoute {
        self.inner.applied.load().route.clone()
    }

    /// Notified whenever the applied route changes.
    pub fn subscribe(&self) -> watch::Receiver<ResolvedRoute> {
        self.inner.route_tx.subscribe()
    }
}

/// Structural validation. `Ok(None)` means the proxy is disabled.
pub fn validate(config: &ProxyConfig) -> Result<Option<ProxyEndpoint>, ProxyError> {
    if !config.enabled {
        return Ok(None);
    }

    let host = config.host.trim();
    if host.is_empty() {
        return Err(ProxyError::InvalidConfig("host is required".into()));
    }
    if host.contains("://") || host.contains('/') || host.chars().any(char::is_whitespace) {
        return Err(ProxyError::InvalidConfig(format!(
            "host must be a bare hostname or address, got {host:?}"
        )));
    }
    let bracketed = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    url::Host::parse(&bracketed)
        .map_err(|e| ProxyError::InvalidConfig(format!("invalid host {host:?}: {e}")))?;

    let port = u16::try_from(config.port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| {
            ProxyError::InvalidConfig(format!("port must be 1-65535, got {}", config.port))
        })?;

    let (username, password) = match &config.credentials {
        Some(creds) if creds.username.trim().is_empty() => {
            return Err(ProxyError::InvalidConfig(
                "username is required when credentials are set".into(),
            ));
        }
        Some(creds) => (Some(creds.username.clone()), Some(creds.password.clone())),
        None => (None, None),
    };

    Ok(Some(ProxyEndpoint {
        scheme: config.scheme,
        host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
        port,
        username,
        password,
    }))
}

// ── Orchestrator ──
//
// Entry point for consumers. Wires the prober, the shared telemetry
// monitor, the proxy resolver and the session manager together and owns
// the background tasks.

use std::sync::Arc;

use chanline_api::{NetworkProber, RouteChecker, TranscodeEngine};
use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capability::{AccelerationBudget, CapabilityProber};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{
    CapabilitySnapshot, Channel, NetworkReading, NetworkSample, PersistedProxy, PersistedState,
    ProxyConfig, ProxyCredentials, RequestedQuality, ResolvedRoute, SessionEvent, SessionId,
    SessionStatus,
};
use crate::pipeline::Configurator;
use crate::proxy::ProxyResolver;
use crate::session::{SessionContext, SessionHandle, SessionManager};
use crate::stream::StateStream;
use crate::telemetry::NetworkMonitor;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Source of proxy secrets, which are never persisted with the proxy.
pub trait CredentialStore: Send + Sync {
    fn proxy_password(&self, host: &str, username: &str) -> Option<SecretString>;
}

/// No stored secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn proxy_password(&self, _host: &str, _username: &str) -> Option<SecretString> {
        None
    }
}

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Services {
    pub engine: Arc<dyn TranscodeEngine>,
    pub network: Arc<dyn NetworkProber>,
    pub route_checker: Arc<dyn RouteChecker>,
}

/// The main entry point.
///
/// Cheaply cloneable via `Arc<OrchestratorInner>`. Call
/// [`start()`](Self::start) before selecting channels and
/// [`shutdown()`](Self::shutdown) to release every pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    config: EngineConfig,
    prober: CapabilityProber,
    monitor: NetworkMonitor,
    resolver: ProxyResolver,
    budget: Arc<AccelerationBudget>,
    sessions: SessionManager,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build the subsystem. Starts nothing.
    pub fn new(config: EngineConfig, services: Services) -> Self {
        let prober = CapabilityProber::new(Arc::clone(&services.engine), config.probe.clone());
        let monitor = NetworkMonitor::new(services.network, config.telemetry.clone());
        let resolver =
            ProxyResolver::new(services.route_checker, services.engine.proxy_schemes());
        let budget = AccelerationBudget::new();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let ctx = SessionContext {
            engine: services.engine,
            prober: prober.clone(),
            monitor: monitor.clone(),
            resolver: resolver.clone(),
            budget: Arc::clone(&budget),
            configurator: Configurator::new(config.pipeline.clone()),
            config: config.clone(),
            events,
        };
        let sessions = SessionManager::new(ctx, cancel.child_token());

        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                prober,
                monitor,
                resolver,
                budget,
                sessions,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The shared telemetry monitor.
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.inner.monitor
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Probe capabilities, take a first network reading and start the
    /// telemetry loop. A failed probe is not fatal: playback continues in
    /// software. Calling `start` twice is a no-op.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("orchestrator already started");
            return;
        }

        if let Err(e) = self.inner.prober.probe().await {
            warn!(error = %e, "initial capability probe failed");
        }
        let reading = self.inner.monitor.run_cycle().await;
        info!(class = %reading.class, "initial network reading");

        handles.push(self.inner.monitor.spawn(self.inner.cancel.child_token()));
        info!("orchestrator started");
    }

    /// Stop every session, then the background tasks.
    pub async fn shutdown(&self) {
        self.inner.sessions.stop_all().await;
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("orchestrator shut down");
    }

    // ── Sessions ─────────────────────────────────────────────────

    pub async fn select_channel(
        &self,
        channel: Channel,
        requested: RequestedQuality,
    ) -> SessionHandle {
        self.inner.sessions.select_channel(channel, requested).await
    }

    pub async fn stop_session(&self, id: SessionId) -> Result<SessionStatus, CoreError> {
        self.inner.sessions.stop_session(id).await
    }

    pub fn session_state(&self, id: SessionId) -> Result<SessionStatus, CoreError> {
        self.inner.sessions.session_state(id)
    }

    pub fn session(&self, id: SessionId) -> Option<SessionHandle> {
        self.inner.sessions.get(id)
    }

    pub fn sessions(&self) -> Vec<SessionStatus> {
        self.inner.sessions.sessions()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.sessions.subscribe_events()
    }

    // ── Capabilities ─────────────────────────────────────────────

    /// Last published snapshot (possibly restored and not yet verified).
    pub fn capabilities(&self) -> Arc<CapabilitySnapshot> {
        self.inner.prober.current()
    }

    /// Snapshot pipelines are configured from.
    pub fn effective_capabilities(&self) -> Arc<CapabilitySnapshot> {
        self.inner.prober.effective()
    }

    pub fn capabilities_verified(&self) -> bool {
        self.inner.prober.is_verified()
    }

    pub fn last_probe_error(&self) -> Option<crate::error::ProbeError> {
        self.inner.prober.last_error()
    }

    pub async fn reprobe(&self) -> Result<Arc<CapabilitySnapshot>, CoreError> {
        Ok(self.inner.prober.probe().await?)
    }

    pub fn hardware_sessions_in_use(&self) -> u32 {
        self.inner.budget.in_use()
    }

    // ── Network ──────────────────────────────────────────────────

    pub fn network_status(&self) -> NetworkReading {
        self.inner.monitor.latest()
    }

    pub fn network_history(&self) -> Vec<NetworkSample> {
        self.inner.monitor.history()
    }

    /// Run one measurement cycle now.
    pub async fn measure_now(&self) -> NetworkReading {
        self.inner.monitor.run_cycle().await
    }

    pub fn watch_network(&self) -> StateStream<NetworkReading> {
        StateStream::new(self.inner.monitor.watch())
    }

    // ── Proxy ────────────────────────────────────────────────────

    /// Validate, probe and apply. On error the previous config stays.
    pub async fn set_proxy_config(&self, config: ProxyConfig) -> Result<ResolvedRoute, CoreError> {
        Ok(self.inner.resolver.apply(config).await?)
    }

    /// Validate and probe without applying.
    pub async fn test_proxy_config(&self, config: &ProxyConfig) -> Result<ResolvedRoute, CoreError> {
        Ok(self.inner.resolver.resolve(config).await?)
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        self.inner.resolver.config()
    }

    pub fn proxy_route(&self) -> ResolvedRoute {
        self.inner.resolver.route()
    }

    pub async fn clear_proxy_config(&self) -> ResolvedRoute {
        self.inner.resolver.clear().await
    }

    // ── Persistence ──────────────────────────────────────────────

    /// State worth keeping across runs. The proxy secret is excluded and
    /// only a probed snapshot is kept.
    pub fn snapshot_state(&self) -> PersistedState {
        let proxy = self.proxy_config();
        let capabilities = self.capabilities();
        PersistedState {
            proxy: Some(PersistedProxy::from(&proxy)),
            capabilities: capabilities
                .probed_at
                .is_some()
                .then(|| CapabilitySnapshot::clone(&capabilities)),
            saved_at: Some(Utc::now()),
        }
    }

    /// Re-apply persisted state.
    ///
    /// The snapshot is published unverified. The proxy is re-validated
    /// through the normal apply path with its secret looked up in
    /// `credentials`; a rejected proxy leaves the direct route in place.
    pub async fn restore(
        &self,
        state: PersistedState,
        credentials: &dyn CredentialStore,
    ) -> Result<(), CoreError> {
        if let Some(snapshot) = state.capabilities {
            self.inner.prober.restore(snapshot);
        }

        let Some(persisted) = state.proxy else {
            return Ok(());
        };
        let credentials = persisted.username.as_deref().and_then(|username| {
            let password = credentials.proxy_password(&persisted.host, username);
            if password.is_none() {
                warn!(host = %persisted.host, "no stored secret for proxy user");
            }
            password.map(|password| ProxyCredentials {
                username: username.to_owned(),
                password,
            })
        });
        let config = ProxyConfig {
            enabled: persisted.enabled,
            scheme: persisted.scheme,
            host: persisted.host,
            port: persisted.port,
            credentials,
        };
        self.set_proxy_config(config).await?;
        Ok(())
    }
}

// ── Stream sessions ──
//
// One task per playback session owns its pipelines and reacts to
// telemetry, capability and route changes with make-before-break swaps.

mod actor;
mod handle;
mod manager;

use std::sync::Arc;

use chanline_api::TranscodeEngine;
use tokio::sync::broadcast;

use crate::capability::{AccelerationBudget, CapabilityProber};
use crate::config::EngineConfig;
use crate::model::SessionEvent;
use crate::pipeline::Configurator;
use crate::proxy::ProxyResolver;
use crate::telemetry::NetworkMonitor;

pub use handle::SessionHandle;
pub use manager::SessionManager;

/// Collaborators every session task shares.
pub(crate) struct SessionContext {
    pub engine: Arc<dyn TranscodeEngine>,
    pub prober: CapabilityProber,
    pub monitor: NetworkMonitor,
    pub resolver: ProxyResolver,
    pub budget: Arc<AccelerationBudget>,
    pub configurator: Configurator,
    pub config: EngineConfig,
    pub events: broadcast::Sender<SessionEvent>,
}

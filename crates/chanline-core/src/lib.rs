//! Stream processing and hardware acceleration orchestration.
//!
//! Sits between the raw services in `chanline-api` and consumers (the
//! CLI, or any player front end):
//!
//! - **[`CapabilityProber`]** discovers decode/encode and hardware support
//!   and publishes immutable snapshots.
//! - **[`NetworkMonitor`]** measures the link periodically and classifies it.
//! - **[`ProxyResolver`]** validates and atomically applies an optional proxy.
//! - **[`Configurator`]** derives a [`PipelineSpec`] from channel, quality,
//!   capabilities and route.
//! - **[`SessionManager`]** runs one task per session with make-before-break
//!   pipeline swaps.
//! - **[`QualityController`]** turns telemetry into tier changes with
//!   hysteresis.
//!
//! [`Orchestrator`] wires everything together.

pub mod adaptive;
pub mod capability;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod proxy;
pub mod session;
pub mod stream;
pub mod telemetry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adaptive::{QualityController, TierChange};
pub use capability::{AccelerationBudget, AccelerationLease, CapabilityProber};
pub use config::{
    AdaptationPolicy, ClassThreshold, EngineConfig, PipelinePolicy, ProbeConfig,
    QualityThresholds, RetryPolicy, TelemetryConfig,
};
pub use error::{CoreError, PipelineOpenError, ProbeError, ProxyError, SessionError};
pub use orchestrator::{CredentialStore, NoCredentials, Orchestrator, Services};
pub use pipeline::{ConfigureRequest, Configurator};
pub use proxy::ProxyResolver;
pub use session::{SessionHandle, SessionManager};
pub use stream::StateStream;
pub use telemetry::{NetworkMonitor, classify};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Capabilities
    CapabilitySnapshot, Codec, DeviceInfo, HardwareBackend,
    // Catalog and quality
    Channel, QualityClass, QualityTier, RequestedQuality,
    // Telemetry
    NetworkReading, NetworkSample,
    // Pipelines
    AccelerationMode, Generation, PipelineSpec, Rendition,
    // Proxy
    ProxyConfig, ProxyCredentials, ResolvedRoute,
    // Sessions
    FailureReason, SessionEvent, SessionId, SessionState, SessionStatus,
    // Persistence
    PersistedProxy, PersistedState,
};

// API types consumers need to build services without depending on
// chanline-api directly.
pub use chanline_api::ProxyScheme;

// ── Domain model ──
//
// Canonical types shared by every orchestration component.

pub mod capability;
pub mod channel;
pub mod network;
pub mod pipeline;
pub mod proxy;
pub mod quality;
pub mod session;
pub mod state;

pub use capability::{CapabilitySnapshot, Codec, DeviceInfo, HardwareBackend};
pub use channel::Channel;
pub use network::{NetworkReading, NetworkSample};
pub use pipeline::{AccelerationMode, Generation, PipelineSpec, Rendition};
pub use proxy::{ProxyConfig, ProxyCredentials, ResolvedRoute};
pub use quality::{QualityClass, QualityTier, RequestedQuality};
pub use session::{FailureReason, SessionEvent, SessionId, SessionState, SessionStatus};
pub use state::{PersistedProxy, PersistedState};

// ── Core error types ──
//
// Domain errors from chanline-core. Consumers never see raw HTTP or
// process failures; `From<chanline_api::OpenError>` and the proxy mapping
// below translate them into orchestration terms.

use std::time::Duration;

use thiserror::Error;

use crate::model::{FailureReason, SessionId};

/// Capability probing failed. The previous snapshot stays current.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("Hardware backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Capability probe timed out after {0:?}")]
    Timeout(Duration),
}

/// A proxy configuration was rejected. The previous route stays applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("Invalid proxy configuration: {0}")]
    InvalidConfig(String),

    #[error("Proxy connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Proxy authentication failed")]
    AuthFailed,
}

/// A pipeline did not reach first-frame-ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineOpenError {
    #[error("Hardware acceleration unavailable: {0}")]
    AccelerationUnavailable(String),

    #[error("Codec unsupported: {0}")]
    CodecUnsupported(String),

    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Transcode engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl PipelineOpenError {
    pub fn is_acceleration(&self) -> bool {
        matches!(self, Self::AccelerationUnavailable(_))
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            Self::AccelerationUnavailable(_) => FailureReason::Acceleration,
            Self::CodecUnsupported(_) => FailureReason::Codec,
            Self::SourceUnreachable(_) => FailureReason::UnreachableSource,
            Self::EngineUnavailable(_) => FailureReason::Engine,
        }
    }
}

impl From<chanline_api::OpenError> for PipelineOpenError {
    fn from(err: chanline_api::OpenError) -> Self {
        use chanline_api::OpenError;
        match err {
            OpenError::AccelerationUnavailable(m) => Self::AccelerationUnavailable(m),
            OpenError::CodecUnsupported(m) => Self::CodecUnsupported(m),
            OpenError::SourceUnreachable(m) => Self::SourceUnreachable(m),
            OpenError::EngineUnavailable(m) => Self::EngineUnavailable(m),
        }
    }
}

/// Terminal session failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Pipeline failed to open after {attempts} attempts ({reason}): {last_error}")]
    RetriesExhausted {
        attempts: u32,
        reason: FailureReason,
        last_error: String,
    },
}

impl SessionError {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::RetriesExhausted { reason, .. } => *reason,
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Component errors ─────────────────────────────────────────────
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Session(#[from] SessionError),

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Session not found: {id}")]
    SessionNotFound { id: SessionId },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<chanline_api::Error> for ProxyError {
    fn from(err: chanline_api::Error) -> Self {
        use chanline_api::Error;
        match err {
            Error::ProxyAuthRequired => Self::AuthFailed,
            Error::ProxyRejected { status } => {
                Self::ConnectionRefused(format!("proxy answered HTTP {status}"))
            }
            Error::InvalidProxy(m) | Error::ClientBuild(m) => Self::InvalidConfig(m),
            Error::InvalidUrl(e) => Self::InvalidConfig(e.to_string()),
            other => Self::ConnectionRefused(other.to_string()),
        }
    }
}

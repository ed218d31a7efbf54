use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use super::pipeline::{AccelerationMode, Generation};
use super::quality::{QualityTier, RequestedQuality};

/// Opaque playback session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Idle,
    Opening,
    Playing,
    Reconfiguring,
    Stopped,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// A pipeline is delivering output.
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing | Self::Reconfiguring)
    }
}

/// Why a session ended up in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    Acceleration,
    Network,
    UnreachableSource,
    Codec,
    Engine,
}

/// Observable session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: SessionId,
    pub channel_id: String,
    pub requested: RequestedQuality,
    pub state: SessionState,
    pub tier: Option<QualityTier>,
    pub acceleration: Option<AccelerationMode>,
    /// Running below what was asked for, or the last adaptation failed.
    pub degraded: bool,
    /// Generation of the applied pipeline.
    pub generation: Generation,
    /// Where the player reads processed output.
    pub output: Option<String>,
    pub failure: Option<FailureReason>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_reconfigured_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub fn new(id: SessionId, channel_id: String, requested: RequestedQuality) -> Self {
        Self {
            id,
            channel_id,
            requested,
            state: SessionState::Idle,
            tier: None,
            acceleration: None,
            degraded: false,
            generation: Generation::default(),
            output: None,
            failure: None,
            last_error: None,
            created_at: Utc::now(),
            last_reconfigured_at: None,
        }
    }
}

/// Lifecycle notifications broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        session: SessionId,
        state: SessionState,
    },
    TierChanged {
        session: SessionId,
        from: QualityTier,
        to: QualityTier,
    },
    Reconfigured {
        session: SessionId,
        generation: Generation,
        tier: QualityTier,
        acceleration: AccelerationMode,
    },
    /// A candidate pipeline failed; the previous one keeps playing.
    AdaptationFailed {
        session: SessionId,
        generation: Generation,
        error: String,
    },
    Stopped {
        session: SessionId,
    },
    Failed {
        session: SessionId,
        reason: FailureReason,
    },
}

impl SessionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::StateChanged { session, .. }
            | Self::TierChanged { session, .. }
            | Self::Reconfigured { session, .. }
            | Self::AdaptationFailed { session, .. }
            | Self::Stopped { session }
            | Self::Failed { session, .. } => *session,
        }
    }
}

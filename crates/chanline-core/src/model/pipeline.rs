use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::capability::{Codec, HardwareBackend};
use super::proxy::ResolvedRoute;
use super::quality::QualityTier;
use super::session::SessionId;

/// Monotonic per-session reconfiguration counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a pipeline decodes and encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AccelerationMode {
    Hardware {
        backend: HardwareBackend,
        decoder: Option<String>,
        encoder: String,
    },
    Software {
        encoder: String,
    },
}

impl AccelerationMode {
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware { .. })
    }

    pub fn encoder(&self) -> &str {
        match self {
            Self::Hardware { encoder, .. } | Self::Software { encoder } => encoder,
        }
    }
}

impl fmt::Display for AccelerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware {
                backend, encoder, ..
            } => write!(f, "hardware ({backend}, {encoder})"),
            Self::Software { encoder } => write!(f, "software ({encoder})"),
        }
    }
}

/// One rung of the bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rendition {
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
}

impl Rendition {
    pub const fn new(width: u32, height: u32, video_bitrate_kbps: u32) -> Self {
        Self {
            width,
            height,
            video_bitrate_kbps,
        }
    }
}

impl fmt::Display for Rendition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {} kb/s",
            self.width, self.height, self.video_bitrate_kbps
        )
    }
}

/// Everything needed to open one transcode pipeline.
///
/// Immutable; a reconfiguration produces a new spec with a higher generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub session: SessionId,
    pub channel_id: String,
    pub source: Url,
    /// Tier actually produced.
    pub tier: QualityTier,
    /// Tier that was asked for before any capability capping.
    pub desired_tier: QualityTier,
    pub codec: Codec,
    pub acceleration: AccelerationMode,
    pub rendition: Rendition,
    pub route: ResolvedRoute,
    pub generation: Generation,
    /// Capped below `desired_tier` by missing capabilities.
    pub degraded: bool,
}

impl PipelineSpec {
    /// Equal in every respect except the generation stamp.
    pub fn same_decision(&self, other: &Self) -> bool {
        self.session == other.session
            && self.channel_id == other.channel_id
            && self.source == other.source
            && self.tier == other.tier
            && self.desired_tier == other.desired_tier
            && self.codec == other.codec
            && self.acceleration == other.acceleration
            && self.rendition == other.rendition
            && self.route == other.route
            && self.degraded == other.degraded
    }

    /// Filesystem-safe label unique to this session and generation.
    pub fn label(&self) -> String {
        format!("{}-{}", self.session, self.generation.0)
    }
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} via {} [{}]",
            self.channel_id, self.tier, self.codec, self.acceleration, self.route, self.generation
        )?;
        if self.degraded {
            write!(f, " degraded from {}", self.desired_tier)?;
        }
        Ok(())
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Video codecs the orchestrator reasons about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[strum(to_string = "H.264")]
    H264,
    #[strum(to_string = "HEVC")]
    Hevc,
    #[strum(to_string = "AV1")]
    Av1,
    #[strum(to_string = "VP9")]
    Vp9,
}

impl Codec {
    /// ffmpeg's name for the codec (and its native decoder).
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "av1",
            Self::Vp9 => "vp9",
        }
    }

    /// Preferred software encoder.
    pub fn software_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Hevc => "libx265",
            Self::Av1 => "libsvtav1",
            Self::Vp9 => "libvpx-vp9",
        }
    }
}

/// Hardware offload families, in order of preference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HardwareBackend {
    Cuda,
    Qsv,
    Vaapi,
    #[strum(to_string = "videotoolbox")]
    VideoToolbox,
}

impl HardwareBackend {
    /// Name passed to ffmpeg's `-hwaccel`.
    pub fn hwaccel_name(self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
            Self::VideoToolbox => "videotoolbox",
        }
    }

    /// Dedicated decoder, if the backend uses one instead of `-hwaccel`
    /// over the native decoder.
    pub fn decoder_for(self, codec: Codec) -> Option<String> {
        match self {
            Self::Cuda => Some(format!("{}_cuvid", codec.ffmpeg_name())),
            Self::Qsv => Some(format!("{}_qsv", codec.ffmpeg_name())),
            Self::Vaapi | Self::VideoToolbox => None,
        }
    }

    pub fn encoder_for(self, codec: Codec) -> Option<String> {
        let suffix = match self {
            Self::Cuda => "nvenc",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
            Self::VideoToolbox => {
                if matches!(codec, Codec::Av1 | Codec::Vp9) {
                    return None;
                }
                "videotoolbox"
            }
        };
        Some(format!("{}_{suffix}", codec.ffmpeg_name()))
    }
}

/// Identity of the acceleration device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub memory_mb: u64,
    /// Concurrent hardware sessions the device accepts.
    pub session_budget: u32,
}

/// Immutable capability report. Replaced wholesale on every successful probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Codecs that can be decoded at all.
    pub decode: BTreeSet<Codec>,
    /// Codecs that can be encoded at all (software or hardware).
    pub encode: BTreeSet<Codec>,
    /// Codecs with a software encoder.
    pub software_encode: BTreeSet<Codec>,
    pub hw_decode: BTreeSet<Codec>,
    pub hw_encode: BTreeSet<Codec>,
    pub backend: Option<HardwareBackend>,
    pub hardware_available: bool,
    pub device: Option<DeviceInfo>,
    pub engine_version: Option<String>,
    /// `None` for the built-in baseline that precedes any probe.
    pub probed_at: Option<DateTime<Utc>>,
}

impl CapabilitySnapshot {
    /// Assumed capabilities before anything was probed: software H.264.
    pub fn baseline() -> Self {
        let h264 = BTreeSet::from([Codec::H264]);
        Self {
            decode: h264.clone(),
            encode: h264.clone(),
            software_encode: h264,
            hw_decode: BTreeSet::new(),
            hw_encode: BTreeSet::new(),
            backend: None,
            hardware_available: false,
            device: None,
            engine_version: None,
            probed_at: None,
        }
    }

    /// Same snapshot with every hardware path masked out.
    pub fn without_hardware(&self) -> Self {
        Self {
            encode: self.software_encode.clone(),
            hw_decode: BTreeSet::new(),
            hw_encode: BTreeSet::new(),
            hardware_available: false,
            ..self.clone()
        }
    }

    /// Hardware can carry `codec` end to end.
    pub fn hardware_supports(&self, codec: Codec) -> bool {
        self.hardware_available
            && self.backend.is_some()
            && self.hw_decode.contains(&codec)
            && self.hw_encode.contains(&codec)
    }

    pub fn hardware_session_budget(&self) -> u32 {
        self.device.as_ref().map_or(0, |d| d.session_budget)
    }
}

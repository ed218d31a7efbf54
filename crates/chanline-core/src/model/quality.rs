use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::capability::Codec;
use super::pipeline::Rendition;

/// Output quality tier, ordered from lowest to highest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum QualityTier {
    #[serde(rename = "SD")]
    #[strum(to_string = "SD", serialize = "480p")]
    Sd,
    #[serde(rename = "HD")]
    #[strum(to_string = "HD", serialize = "720p")]
    Hd,
    #[serde(rename = "FHD")]
    #[strum(to_string = "FHD", serialize = "1080p")]
    Fhd,
    #[serde(rename = "4K", alias = "UHD")]
    #[strum(to_string = "4K", serialize = "UHD", serialize = "2160p")]
    Uhd4k,
}

impl QualityTier {
    pub const LOWEST: Self = Self::Sd;
    pub const HIGHEST: Self = Self::Uhd4k;

    /// Next tier up, if any.
    pub fn up(self) -> Option<Self> {
        match self {
            Self::Sd => Some(Self::Hd),
            Self::Hd => Some(Self::Fhd),
            Self::Fhd => Some(Self::Uhd4k),
            Self::Uhd4k => None,
        }
    }

    /// Next tier down, if any.
    pub fn down(self) -> Option<Self> {
        match self {
            Self::Sd => None,
            Self::Hd => Some(Self::Sd),
            Self::Fhd => Some(Self::Hd),
            Self::Uhd4k => Some(Self::Fhd),
        }
    }

    /// Lowest network class that sustains this tier.
    pub fn required_class(self) -> QualityClass {
        match self {
            Self::Sd => QualityClass::Poor,
            Self::Hd => QualityClass::Fair,
            Self::Fhd => QualityClass::Good,
            Self::Uhd4k => QualityClass::Excellent,
        }
    }

    /// Highest tier a network class sustains.
    pub fn supported_by(class: QualityClass) -> Self {
        match class {
            QualityClass::Poor => Self::Sd,
            QualityClass::Fair => Self::Hd,
            QualityClass::Good => Self::Fhd,
            QualityClass::Excellent => Self::Uhd4k,
        }
    }

    /// Target codec: H.264 up to FHD, HEVC for 4K.
    pub fn codec(self) -> Codec {
        match self {
            Self::Uhd4k => Codec::Hevc,
            Self::Sd | Self::Hd | Self::Fhd => Codec::H264,
        }
    }

    /// Bitrate ladder rung for this tier.
    pub fn rendition(self) -> Rendition {
        match self {
            Self::Sd => Rendition::new(854, 480, 1_500),
            Self::Hd => Rendition::new(1280, 720, 3_000),
            Self::Fhd => Rendition::new(1920, 1080, 6_000),
            Self::Uhd4k => Rendition::new(3840, 2160, 16_000),
        }
    }
}

/// What the viewer asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedQuality {
    /// Let the adaptive controller pick.
    #[default]
    Auto,
    Fixed(QualityTier),
}

impl fmt::Display for RequestedQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(tier) => write!(f, "{tier}"),
        }
    }
}

impl FromStr for RequestedQuality {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Fixed)
        }
    }
}

/// Coarse network-health bucket, ordered from worst to best.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QualityClass {
    Poor,
    Fair,
    Good,
    Excellent,
}

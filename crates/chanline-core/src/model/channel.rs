use serde::{Deserialize, Serialize};
use url::Url;

use super::quality::QualityTier;

/// A playable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub url: Url,
    /// Best quality the source itself offers; output never exceeds it.
    pub nominal_quality: QualityTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

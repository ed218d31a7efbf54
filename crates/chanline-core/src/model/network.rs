use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quality::QualityClass;

/// One telemetry measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub bandwidth_mbps: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    /// Fraction of lost probes, `0.0..=1.0`.
    pub packet_loss: f64,
    pub timestamp: DateTime<Utc>,
    /// `false` when the measurement failed and the values are placeholders.
    pub measured: bool,
}

impl NetworkSample {
    /// Placeholder recorded when a measurement fails or times out.
    pub fn unmeasured(timestamp: DateTime<Utc>) -> Self {
        Self {
            bandwidth_mbps: 0.0,
            latency_ms: 0.0,
            jitter_ms: 0.0,
            packet_loss: 0.0,
            timestamp,
            measured: false,
        }
    }
}

/// A sample together with the class derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReading {
    pub sample: NetworkSample,
    pub class: QualityClass,
}

impl NetworkReading {
    pub fn unmeasured(timestamp: DateTime<Utc>) -> Self {
        Self {
            sample: NetworkSample::unmeasured(timestamp),
            class: QualityClass::Poor,
        }
    }
}

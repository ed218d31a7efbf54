// ── Runtime orchestration configuration ──
//
// Policy knobs for every component. Never touches disk; the config crate
// builds an `EngineConfig` from the user's file and hands it in.

use std::time::Duration;

use crate::model::QualityTier;

/// Bounds a sample must meet to earn a quality class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassThreshold {
    pub min_bandwidth_mbps: f64,
    pub max_latency_ms: f64,
    /// Fraction, `0.001` is 0.1 %.
    pub max_packet_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub excellent: ClassThreshold,
    pub good: ClassThreshold,
    pub fair: ClassThreshold,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: ClassThreshold {
                min_bandwidth_mbps: 50.0,
                max_latency_ms: 20.0,
                max_packet_loss: 0.001,
            },
            good: ClassThreshold {
                min_bandwidth_mbps: 25.0,
                max_latency_ms: 50.0,
                max_packet_loss: 0.005,
            },
            fair: ClassThreshold {
                min_bandwidth_mbps: 10.0,
                max_latency_ms: 100.0,
                max_packet_loss: 0.01,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Nominal cycle period.
    pub interval: Duration,
    /// Relative spread applied around `interval`, `0.25` is ±25 %.
    pub jitter: f64,
    /// Ring buffer capacity.
    pub history: usize,
    /// Measurements exceeding this record an unmeasured sample.
    pub measure_timeout: Duration,
    pub thresholds: QualityThresholds,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            jitter: 0.25,
            history: 20,
            measure_timeout: Duration::from_secs(10),
            thresholds: QualityThresholds::default(),
        }
    }
}

/// Hysteresis for AUTO quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptationPolicy {
    /// Sustained headroom needed before stepping up one tier.
    pub upgrade_dwell: Duration,
    /// Consecutive low samples before stepping down one tier.
    pub downgrade_after: u32,
}

impl Default for AdaptationPolicy {
    fn default() -> Self {
        Self {
            upgrade_dwell: Duration::from_secs(30),
            downgrade_after: 2,
        }
    }
}

/// Backoff for pipeline opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: u32,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            factor: 2,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self.factor.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(exp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub timeout: Duration,
    /// Acceleration-attributable open failures that trigger a re-probe.
    pub reprobe_after_failures: u32,
    /// Concurrent hardware sessions per device.
    ///
    /// A reconfiguration opens its candidate before closing the active
    /// pipeline, so it needs a free slot of its own. With a budget of 1 a
    /// single hardware session adapts onto software.
    pub session_budget: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            reprobe_after_failures: 3,
            session_budget: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePolicy {
    /// Highest tier software transcoding is trusted with.
    pub software_max_tier: QualityTier,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            software_max_tier: QualityTier::Fhd,
        }
    }
}

/// Complete orchestration configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub telemetry: TelemetryConfig,
    pub adaptation: AdaptationPolicy,
    pub retry: RetryPolicy,
    pub probe: ProbeConfig,
    pub pipeline: PipelinePolicy,
    /// Keep existing sessions when a new channel is selected.
    pub multi_view: bool,
}

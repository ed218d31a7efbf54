use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chanline_api::{Measurement, NetworkProber};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::ring::RingBuffer;
use crate::config::{QualityThresholds, TelemetryConfig};
use crate::convert;
use crate::model::{NetworkReading, NetworkSample, QualityClass};

const READING_CHANNEL_SIZE: usize = 64;

/// Classify a sample against the thresholds. Unmeasured samples are poor.
pub fn classify(sample: &NetworkSample, thresholds: &QualityThresholds) -> QualityClass {
    if !sample.measured {
        return QualityClass::Poor;
    }
    let meets = |t: &crate::config::ClassThreshold| {
        sample.bandwidth_mbps >= t.min_bandwidth_mbps
            && sample.latency_ms <= t.max_latency_ms
            && sample.packet_loss <= t.max_packet_loss
    };
    if meets(&thresholds.excellent) {
        QualityClass::Excellent
    } else if meets(&thresholds.good) {
        QualityClass::Good
    } else if meets(&thresholds.fair) {
        QualityClass::Fair
    } else {
        QualityClass::Poor
    }
}

/// Shared network monitor. One instance serves every session.
///
/// Cheaply cloneable. [`latest()`](Self::latest) never blocks; each new
/// reading is also fanned out to every [`subscribe()`](Self::subscribe)
/// receiver.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    prober: Arc<dyn NetworkProber>,
    config: TelemetryConfig,
    history: Mutex<RingBuffer<NetworkSample>>,
    latest: watch::Sender<NetworkReading>,
    readings: broadcast::Sender<NetworkReading>,
    cycles: AtomicU64,
    /// Per-instance offset into the jitter curve, radians.
    phase: f64,
}

impl NetworkMonitor {
    pub fn new(prober: Arc<dyn NetworkProber>, config: TelemetryConfig) -> Self {
        let (latest, _) = watch::channel(NetworkReading::unmeasured(Utc::now()));
        let (readings, _) = broadcast::channel(READING_CHANNEL_SIZE);
        let history = Mutex::new(RingBuffer::new(config.history));
        Self {
            inner: Arc::new(MonitorInner {
                prober,
                config,
                history,
                latest,
                readings,
                cycles: AtomicU64::new(0),
                phase: random_phase(),
            }),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    /// Most recent reading (a poor placeholder before the first cycle).
    pub fn latest(&self) -> NetworkReading {
        self.inner.latest.borrow().clone()
    }

    /// Receive every reading recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkReading> {
        self.inner.readings.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<NetworkReading> {
        self.inner.latest.subscribe()
    }

    /// Ring buffer contents, oldest first.
    pub fn history(&self) -> Vec<NetworkSample> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Measure once and record the outcome. Failures record a poor,
    /// unmeasured sample rather than an error.
    pub async fn run_cycle(&self) -> NetworkReading {
        let timeout = self.inner.config.measure_timeout;
        match tokio::time::timeout(timeout, self.inner.prober.measure()).await {
            Ok(Ok(m)) => self.record_measurement(&m, Utc::now()),
            Ok(Err(e)) if e.is_transient() => {
                debug!(error = %e, "network measurement failed, recording poor sample");
                self.record_failure(Utc::now())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "network measurement failed");
                self.record_failure(Utc::now())
            }
            Err(_) => {
                warn!(timeout = ?timeout, "network measurement timed out");
                self.record_failure(Utc::now())
            }
        }
    }

    pub fn record_measurement(&self, m: &Measurement, at: DateTime<Utc>) -> NetworkReading {
        self.record(convert::sample_from_measurement(m, at))
    }

    pub fn record_failure(&self, at: DateTime<Utc>) -> NetworkReading {
        self.record(NetworkSample::unmeasured(at))
    }

    /// Classify, store, and publish a sample.
    pub fn record(&self, sample: NetworkSample) -> NetworkReading {
        let class = classify(&sample, &self.inner.config.thresholds);
        let reading = NetworkReading {
            sample: sample.clone(),
            class,
        };

        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample);
        self.inner.latest.send_replace(reading.clone());
        // No subscribers is fine.
        let _ = self.inner.readings.send(reading.clone());

        debug!(
            class = %reading.class,
            bandwidth_mbps = reading.sample.bandwidth_mbps,
            latency_ms = reading.sample.latency_ms,
            loss = reading.sample.packet_loss,
            "network reading"
        );
        reading
    }

    /// Delay before the next cycle.
    ///
    /// Spread of ±`jitter` around the interval. Each monitor starts at a
    /// random point of the curve, so clients don't measure in lockstep.
    pub fn next_delay(&self, cycle: u64) -> Duration {
        let config = &self.inner.config;
        let jitter = config.jitter.clamp(0.0, 0.9);
        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let offset = (cycle as f64).mul_add(7.3, self.inner.phase).sin();
        config.interval.mul_f64(jitter.mul_add(offset, 1.0))
    }

    /// Spawn the periodic measurement loop.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor_task(monitor, cancel).await })
    }
}

fn random_phase() -> f64 {
    let (high, _) = Uuid::new_v4().as_u64_pair();
    let bits = u32::try_from(high >> 32).unwrap_or(0);
    f64::from(bits) / f64::from(u32::MAX) * std::f64::consts::TAU
}

async fn monitor_task(monitor: NetworkMonitor, cancel: CancellationToken) {
    loop {
        let cycle = monitor.inner.cycles.fetch_add(1, Ordering::Relaxed);
        let delay = monitor.next_delay(cycle);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = monitor.run_cycle() => {}
        }
    }
    debug!("network monitor stopped");
}

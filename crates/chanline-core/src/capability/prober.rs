use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chanline_api::TranscodeEngine;
use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::convert;
use crate::error::ProbeError;
use crate::model::CapabilitySnapshot;

type ProbeResult = Result<Arc<CapabilitySnapshot>, ProbeError>;
type InFlight = Shared<BoxFuture<'static, ProbeResult>>;

/// Discovers engine capabilities and publishes them as immutable snapshots.
///
/// Cheaply cloneable. Concurrent [`probe()`](Self::probe) calls share one
/// in-flight probe. A failed probe leaves [`current()`](Self::current)
/// untouched but masks hardware out of [`effective()`](Self::effective).
#[derive(Clone)]
pub struct CapabilityProber {
    inner: Arc<ProberInner>,
}

struct ProberInner {
    engine: Arc<dyn TranscodeEngine>,
    config: ProbeConfig,
    current: ArcSwap<CapabilitySnapshot>,
    /// Set once a probe succeeds; cleared by failures and by restore.
    verified: AtomicBool,
    last_error: Mutex<Option<ProbeError>>,
    in_flight: tokio::sync::Mutex<Option<InFlight>>,
    accel_failures: AtomicU32,
    /// Bumped on every publish, success or failure.
    version: watch::Sender<u64>,
}

impl CapabilityProber {
    pub fn new(engine: Arc<dyn TranscodeEngine>, config: ProbeConfig) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(ProberInner {
                engine,
                config,
                current: ArcSwap::from_pointee(CapabilitySnapshot::baseline()),
                verified: AtomicBool::new(false),
                last_error: Mutex::new(None),
                in_flight: tokio::sync::Mutex::new(None),
                accel_failures: AtomicU32::new(0),
                version,
            }),
        }
    }

    /// Probe the engine, or join a probe that is already running.
    pub async fn probe(&self) -> ProbeResult {
        let shared = {
            let mut slot = self.inner.in_flight.lock().await;
            if let Some(existing) = slot.as_ref() {
                debug!("joining in-flight capability probe");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let fut = async move { inner.run_probe().await }.boxed().shared();
                *slot = Some(fut.clone());
                fut
            }
        };

        let result = shared.clone().await;

        let mut slot = self.inner.in_flight.lock().await;
        if slot.as_ref().is_some_and(|f| Shared::ptr_eq(f, &shared)) {
            *slot = None;
        }
        result
    }

    /// Last published snapshot, verified or not.
    pub fn current(&self) -> Arc<CapabilitySnapshot> {
        self.inner.current.load_full()
    }

    /// Snapshot the configurator should use: hardware is only offered
    /// after a successful probe.
    pub fn effective(&self) -> Arc<CapabilitySnapshot> {
        let current = self.current();
        if self.is_verified() {
            current
        } else {
            Arc::new(current.without_hardware())
        }
    }

    pub fn is_verified(&self) -> bool {
        self.inner.verified.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<ProbeError> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change notifications; the value is a publish counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Publish a cached snapshot as current but unverified.
    pub fn restore(&self, snapshot: CapabilitySnapshot) {
        self.inner.current.store(Arc::new(snapshot));
        self.inner.verified.store(false, Ordering::Release);
        self.inner.bump();
        debug!("restored cached capability snapshot (unverified)");
    }

    /// Record a pipeline open that failed for acceleration reasons.
    ///
    /// Reaching the configured threshold starts a background re-probe.
    pub fn note_acceleration_failure(&self) {
        let failures = self.inner.accel_failures.fetch_add(1, Ordering::AcqRel) + 1;
        let threshold = self.inner.config.reprobe_after_failures;
        if threshold > 0 && failures >= threshold {
            self.inner.accel_failures.store(0, Ordering::Release);
            warn!(failures, "repeated acceleration failures, re-probing capabilities");
            let prober = self.clone();
            tokio::spawn(async move {
                let _ = prober.probe().await;
            });
        }
    }

    /// A hardware pipeline opened fine; the failure streak is over.
    pub fn note_acceleration_success(&self) {
        self.inner.accel_failures.store(0, Ordering::Release);
    }
}

impl ProberInner {
    async fn run_probe(&self) -> ProbeResult {
        let started = Utc::now();
        let outcome = tokio::time::timeout(self.config.timeout, self.engine.capabilities()).await;

        let result = match outcome {
            Err(_) => Err(ProbeError::Timeout(self.config.timeout)),
            Ok(Err(e)) => Err(ProbeError::BackendUnavailable(e.to_string())),
            Ok(Ok(raw)) => Ok(Arc::new(convert::snapshot_from_engine(
                &raw,
                self.config.session_budget,
                started,
            ))),
        };

        match result {
            Ok(snapshot) => {
                self.current.store(Arc::clone(&snapshot));
                self.verified.store(true, Ordering::Release);
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
                self.accel_failures.store(0, Ordering::Release);
                self.bump();
                info!(
                    hardware = snapshot.hardware_available,
                    backend = ?snapshot.backend,
                    version = ?snapshot.engine_version,
                    "capabilities probed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.verified.store(false, Ordering::Release);
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(e.clone());
                self.bump();
                warn!(error = %e, "capability probe failed, continuing in software mode");
                Err(e)
            }
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use chanline_api::{
        EngineCapabilities, Error as ApiError, GpuDevice, OpenError, OpenRequest, RunningPipeline,
    };

    use crate::model::Codec;

    struct CountingEngine {
        calls: AtomicUsize,
        delay: Duration,
        fail: AtomicBool,
    }

    impl CountingEngine {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl TranscodeEngine for CountingEngine {
        async fn capabilities(&self) -> Result<EngineCapabilities, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::EngineNotFound {
                    program: "ffmpeg".into(),
                });
            }
            Ok(EngineCapabilities {
                version: Some("7.0".into()),
                hwaccels: vec!["cuda".into()],
                decoders: vec!["h264".into(), "h264_cuvid".into()],
                encoders: vec!["libx264".into(), "h264_nvenc".into()],
                devices: vec![GpuDevice {
                    name: "GPU".into(),
                    memory_mb: 4096,
                }],
            })
        }

        async fn open(&self, _: OpenRequest) -> Result<Box<dyn RunningPipeline>, OpenError> {
            Err(OpenError::EngineUnavailable("not used".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_probes_coalesce() {
        let engine = CountingEngine::new(Duration::from_millis(200));
        let prober = CapabilityProber::new(engine.clone(), ProbeConfig::default());

        let (a, b, c) = tokio::join!(prober.probe(), prober.probe(), prober.probe());

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        let a = a.unwrap();
        assert!(Arc::ptr_eq(&a, &b.unwrap()));
        assert!(Arc::ptr_eq(&a, &c.unwrap()));
        assert!(prober.effective().hardware_supports(Codec::H264));

        prober.probe().await.unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_snapshot_but_masks_hardware() {
        let engine = CountingEngine::new(Duration::ZERO);
        let prober = CapabilityProber::new(engine.clone(), ProbeConfig::default());
        let good = prober.probe().await.unwrap();

        engine.fail.store(true, Ordering::SeqCst);
        let err = prober.probe().await.unwrap_err();

        assert!(matches!(err, ProbeError::BackendUnavailable(_)));
        assert!(Arc::ptr_eq(&prober.current(), &good));
        assert!(!prober.effective().hardware_available);
        assert_eq!(prober.last_error(), Some(err));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_engine_times_out() {
        let engine = CountingEngine::new(Duration::from_secs(60));
        let config = ProbeConfig {
            timeout: Duration::from_secs(5),
            ..ProbeConfig::default()
        };
        let prober = CapabilityProber::new(engine, config);

        let err = prober.probe().await.unwrap_err();

        assert_eq!(err, ProbeError::Timeout(Duration::from_secs(5)));
        assert_eq!(prober.current().probed_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn restored_snapshot_is_unverified_until_probed() {
        let engine = CountingEngine::new(Duration::ZERO);
        let prober = CapabilityProber::new(engine.clone(), ProbeConfig::default());
        let cached = (*prober.probe().await.unwrap()).clone();

        let fresh = CapabilityProber::new(engine, ProbeConfig::default());
        fresh.restore(cached);
        assert!(fresh.current().hardware_available);
        assert!(!fresh.effective().hardware_available);

        fresh.probe().await.unwrap();
        assert!(fresh.effective().hardware_available);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_acceleration_failures_trigger_reprobe() {
        let engine = CountingEngine::new(Duration::ZERO);
        let prober = CapabilityProber::new(engine.clone(), ProbeConfig::default());
        let mut changes = prober.subscribe();

        prober.note_acceleration_failure();
        prober.note_acceleration_failure();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);

        prober.note_acceleration_failure();
        changes.changed().await.unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }
}

use std::sync::Arc;

use chanline_api::{RunningPipeline, TranscodeEngine};
use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SessionContext;
use crate::adaptive::QualityController;
use crate::capability::AccelerationLease;
use crate::convert;
use crate::error::{PipelineOpenError, SessionError};
use crate::model::{
    Channel, FailureReason, Generation, NetworkReading, PipelineSpec, RequestedQuality,
    SessionEvent, SessionId, SessionState, SessionStatus,
};
use crate::pipeline::ConfigureRequest;

/// A pipeline that reached first-frame-ready, with its hardware slot.
struct Active {
    spec: PipelineSpec,
    pipeline: Box<dyn RunningPipeline>,
    _lease: Option<AccelerationLease>,
}

type OpenFuture = BoxFuture<'static, Result<Active, PipelineOpenError>>;

/// Replacement pipeline being opened while the active one keeps playing.
struct Candidate {
    spec: PipelineSpec,
    open: OpenFuture,
}

pub(crate) struct SessionActor {
    ctx: Arc<SessionContext>,
    id: SessionId,
    channel: Channel,
    requested: RequestedQuality,
    controller: QualityController,
    /// Last generation stamped on a spec.
    generation: Generation,
    status: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
}

impl SessionActor {
    pub fn new(
        ctx: Arc<SessionContext>,
        id: SessionId,
        channel: Channel,
        requested: RequestedQuality,
        status: watch::Sender<SessionStatus>,
        cancel: CancellationToken,
    ) -> Self {
        let controller = QualityController::new(
            ctx.config.adaptation.clone(),
            channel.nominal_quality,
            ctx.monitor.latest().class,
        );
        Self {
            ctx,
            id,
            channel,
            requested,
            controller,
            generation: Generation::default(),
            status,
            cancel,
        }
    }

    pub async fn run(mut self) {
        let cancel = self.cancel.clone();
        let mut readings = self.ctx.monitor.subscribe();
        let mut capabilities = self.ctx.prober.subscribe();
        let mut routes = self.ctx.resolver.subscribe();
        let _ = capabilities.borrow_and_update();
        let _ = routes.borrow_and_update();

        self.set_state(SessionState::Opening);
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.open_with_retry() => Some(result),
        };
        let mut active = match opened {
            None => {
                self.set_stopped();
                return;
            }
            Some(Err(e)) => {
                self.set_failed(&e);
                return;
            }
            Some(Ok(active)) => active,
        };
        self.publish_applied(&active, false);
        self.set_state(SessionState::Playing);

        let mut candidate: Option<Candidate> = None;
        let mut readings_open = self.requested == RequestedQuality::Auto;
        let mut capabilities_open = true;
        let mut routes_open = true;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                (spec, result) = wait_candidate(&mut candidate) => {
                    candidate = None;
                    self.finish_candidate(&mut active, spec, result).await;
                }
                reading = readings.recv(), if readings_open => match reading {
                    Ok(reading) => self.on_reading(&reading, &active, &mut candidate),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(session = %self.id, skipped, "telemetry receiver lagged");
                    }
                    Err(RecvError::Closed) => readings_open = false,
                },
                changed = capabilities.changed(), if capabilities_open => match changed {
                    Ok(()) => self.replan("capabilities", &active, &mut candidate),
                    Err(_) => capabilities_open = false,
                },
                changed = routes.changed(), if routes_open => match changed {
                    Ok(()) => self.replan("route", &active, &mut candidate),
                    Err(_) => routes_open = false,
                },
            }
        }

        // Dropping the in-flight open kills its process and frees its lease.
        if let Some(discarded) = candidate.take() {
            debug!(session = %self.id, generation = %discarded.spec.generation, "discarding candidate on stop");
        }
        close(active).await;
        self.set_stopped();
    }

    // ── Opening ──────────────────────────────────────────────────

    async fn open_with_retry(&mut self) -> Result<Active, SessionError> {
        let policy = self.ctx.config.retry.clone();
        let attempts = policy.max_attempts.max(1);
        let mut last: Option<PipelineOpenError> = None;

        for attempt in 1..=attempts {
            let force_software = attempt == attempts
                && last.as_ref().is_some_and(PipelineOpenError::is_acceleration);
            if force_software {
                info!(session = %self.id, attempt, "falling back to software for final attempt");
            }

            let generation = self.generation.next();
            let spec = self.decide(!force_software, generation);
            let (spec, lease) = self.lease_for(spec);
            self.generation = generation;
            let hardware = spec.acceleration.is_hardware();
            info!(session = %self.id, attempt, spec = %spec, "opening pipeline");

            match open_pipeline(Arc::clone(&self.ctx.engine), spec, lease).await {
                Ok(active) => {
                    if hardware {
                        self.ctx.prober.note_acceleration_success();
                    }
                    return Ok(active);
                }
                Err(e) => {
                    warn!(session = %self.id, attempt, error = %e, "pipeline open failed");
                    if e.is_acceleration() {
                        self.ctx.prober.note_acceleration_failure();
                    }
                    let message = e.to_string();
                    self.status.send_modify(|s| s.last_error = Some(message));
                    last = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        let (reason, last_error) = match last {
            Some(e) => (self.failure_reason(&e), e.to_string()),
            None => (FailureReason::Engine, "no open attempted".to_owned()),
        };
        Err(SessionError::RetriesExhausted {
            attempts,
            reason,
            last_error,
        })
    }

    /// An unreachable source while telemetry cannot measure anything is a
    /// network failure rather than a source failure.
    fn failure_reason(&self, error: &PipelineOpenError) -> FailureReason {
        match error {
            PipelineOpenError::SourceUnreachable(_) if !self.ctx.monitor.latest().sample.measured => {
                FailureReason::Network
            }
            other => other.reason(),
        }
    }

    // ── Planning ─────────────────────────────────────────────────

    fn decide(&self, allow_hardware: bool, generation: Generation) -> PipelineSpec {
        let capabilities = self.ctx.prober.effective();
        let route = self.ctx.resolver.route();
        let request = ConfigureRequest {
            session: self.id,
            channel: &self.channel,
            requested: self.requested,
            recommended: self.controller.tier(),
            capabilities: &capabilities,
            route: &route,
            allow_hardware,
        };
        self.ctx.configurator.configure(&request, generation)
    }

    /// Reserve a hardware slot for `spec`, or re-plan it in software when
    /// the device budget is spent. The active pipeline still holds its own
    /// slot while a candidate opens.
    fn lease_for(&self, spec: PipelineSpec) -> (PipelineSpec, Option<AccelerationLease>) {
        if !spec.acceleration.is_hardware() {
            return (spec, None);
        }
        let limit = self.ctx.prober.effective().hardware_session_budget();
        match self.ctx.budget.try_acquire(limit) {
            Some(lease) => (spec, Some(lease)),
            None => {
                info!(session = %self.id, limit, "hardware session budget exhausted, using software");
                (self.decide(false, spec.generation), None)
            }
        }
    }

    fn on_reading(
        &mut self,
        reading: &NetworkReading,
        active: &Active,
        candidate: &mut Option<Candidate>,
    ) {
        let Some(change) = self.controller.observe(reading) else {
            return;
        };
        self.emit(SessionEvent::TierChanged {
            session: self.id,
            from: change.from,
            to: change.to,
        });
        self.replan("tier", active, candidate);
    }

    /// Re-derive the spec and start a candidate when the decision differs
    /// from the one being played (or already being opened).
    fn replan(&mut self, trigger: &'static str, active: &Active, candidate: &mut Option<Candidate>) {
        let generation = self.generation.next();
        let ideal = self.decide(true, generation);
        if self.settled(&ideal, active, candidate, trigger) {
            return;
        }
        let (spec, lease) = self.lease_for(ideal);
        if self.settled(&spec, active, candidate, trigger) {
            return;
        }

        self.generation = generation;
        if let Some(superseded) = candidate.take() {
            debug!(
                session = %self.id,
                superseded = %superseded.spec.generation,
                "newer decision supersedes in-flight candidate"
            );
        }
        info!(session = %self.id, trigger, spec = %spec, "reconfiguring");
        let open = open_pipeline(Arc::clone(&self.ctx.engine), spec.clone(), lease);
        *candidate = Some(Candidate { spec, open });
        self.set_state(SessionState::Reconfiguring);
    }

    /// `true` when `planned` is already being opened or already playing.
    /// In the latter case any in-flight candidate is abandoned.
    fn settled(
        &self,
        planned: &PipelineSpec,
        active: &Active,
        candidate: &mut Option<Candidate>,
        trigger: &'static str,
    ) -> bool {
        if candidate
            .as_ref()
            .is_some_and(|pending| pending.spec.same_decision(planned))
        {
            return true;
        }
        if !active.spec.same_decision(planned) {
            return false;
        }
        if candidate.take().is_some() {
            debug!(session = %self.id, trigger, "change reverted, discarding candidate");
            self.set_state(SessionState::Playing);
        }
        true
    }

    async fn finish_candidate(
        &mut self,
        active: &mut Active,
        spec: PipelineSpec,
        result: Result<Active, PipelineOpenError>,
    ) {
        match result {
            Ok(next) if next.spec.generation <= active.spec.generation => {
                debug!(session = %self.id, generation = %next.spec.generation, "stale pipeline discarded");
                close(next).await;
            }
            Ok(next) => {
                if next.spec.acceleration.is_hardware() {
                    self.ctx.prober.note_acceleration_success();
                }
                let previous = std::mem::replace(active, next);
                self.publish_applied(active, true);
                self.set_state(SessionState::Playing);
                close(previous).await;
                self.emit(SessionEvent::Reconfigured {
                    session: self.id,
                    generation: active.spec.generation,
                    tier: active.spec.tier,
                    acceleration: active.spec.acceleration.clone(),
                });
            }
            Err(e) => {
                warn!(
                    session = %self.id,
                    generation = %spec.generation,
                    error = %e,
                    "adaptation failed, keeping current pipeline"
                );
                if e.is_acceleration() {
                    self.ctx.prober.note_acceleration_failure();
                }
                self.controller.reset_to(active.spec.desired_tier);
                let message = e.to_string();
                self.status.send_modify(|s| {
                    s.degraded = true;
                    s.last_error = Some(message.clone());
                });
                self.set_state(SessionState::Playing);
                self.emit(SessionEvent::AdaptationFailed {
                    session: self.id,
                    generation: spec.generation,
                    error: message,
                });
            }
        }
    }

    // ── Status ───────────────────────────────────────────────────

    fn publish_applied(&self, active: &Active, reconfigured: bool) {
        let spec = &active.spec;
        let output = active.pipeline.output().to_owned();
        self.status.send_modify(|s| {
            s.tier = Some(spec.tier);
            s.acceleration = Some(spec.acceleration.clone());
            s.degraded = spec.degraded;
            s.generation = spec.generation;
            s.output = Some(output);
            if reconfigured {
                s.last_reconfigured_at = Some(Utc::now());
            }
        });
    }

    fn set_state(&self, state: SessionState) {
        let changed = self.status.send_if_modified(|s| {
            if s.state == state {
                false
            } else {
                s.state = state;
                true
            }
        });
        if changed {
            debug!(session = %self.id, %state, "session state changed");
            self.emit(SessionEvent::StateChanged {
                session: self.id,
                state,
            });
        }
    }

    fn set_stopped(&self) {
        self.set_state(SessionState::Stopped);
        info!(session = %self.id, channel = %self.channel.id, "session stopped");
        self.emit(SessionEvent::Stopped { session: self.id });
    }

    fn set_failed(&self, error: &SessionError) {
        let reason = error.reason();
        let message = error.to_string();
        self.status.send_modify(|s| {
            s.failure = Some(reason);
            s.last_error = Some(message);
        });
        self.set_state(SessionState::Failed);
        warn!(session = %self.id, channel = %self.channel.id, %reason, "session failed");
        self.emit(SessionEvent::Failed {
            session: self.id,
            reason,
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.ctx.events.send(event);
    }
}

fn open_pipeline(
    engine: Arc<dyn TranscodeEngine>,
    spec: PipelineSpec,
    lease: Option<AccelerationLease>,
) -> OpenFuture {
    async move {
        let request = convert::open_request(&spec);
        let pipeline = engine.open(request).await?;
        debug!(label = %spec.label(), output = pipeline.output(), "pipeline ready");
        Ok(Active {
            spec,
            pipeline,
            _lease: lease,
        })
    }
    .boxed()
}

async fn wait_candidate(
    slot: &mut Option<Candidate>,
) -> (PipelineSpec, Result<Active, PipelineOpenError>) {
    match slot {
        Some(candidate) => {
            let result = (&mut candidate.open).await;
            (candidate.spec.clone(), result)
        }
        None => std::future::pending().await,
    }
}

async fn close(active: Active) {
    let Active {
        spec,
        pipeline,
        _lease: lease,
    } = active;
    debug!(label = %spec.label(), "closing pipeline");
    pipeline.close().await;
    drop(lease);
}

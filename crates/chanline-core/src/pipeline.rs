// ── Pipeline configuration ──
//
// Pure derivation of a PipelineSpec from the channel, the requested and
// recommended quality, the capability snapshot, and the route.

use tracing::debug;

use crate::config::PipelinePolicy;
use crate::model::{
    AccelerationMode, CapabilitySnapshot, Channel, Codec, Generation, PipelineSpec,
    QualityTier, RequestedQuality, ResolvedRoute, SessionId,
};

/// Inputs for one configuration decision.
#[derive(Debug, Clone, Copy)]
pub struct ConfigureRequest<'a> {
    pub session: SessionId,
    pub channel: &'a Channel,
    pub requested: RequestedQuality,
    /// Adaptive controller's current tier, used when `requested` is AUTO.
    pub recommended: QualityTier,
    pub capabilities: &'a CapabilitySnapshot,
    pub route: &'a ResolvedRoute,
    /// `false` when no hardware session slot is free.
    pub allow_hardware: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Configurator {
    policy: PipelinePolicy,
}

impl Configurator {
    pub fn new(policy: PipelinePolicy) -> Self {
        Self { policy }
    }

    /// Derive a spec. Identical requests yield identical decisions; only
    /// the generation stamp differs between calls.
    pub fn configure(&self, request: &ConfigureRequest<'_>, generation: Generation) -> PipelineSpec {
        let asked = match request.requested {
            RequestedQuality::Auto => request.recommended,
            RequestedQuality::Fixed(tier) => tier,
        };
        let desired = asked.min(request.channel.nominal_quality);
        let caps = request.capabilities;

        let hardware = request
            .allow_hardware
            .then_some(caps.backend)
            .flatten()
            .filter(|_| caps.hardware_supports(desired.codec()));

        let (tier, codec, acceleration) = match hardware {
            Some(backend) => {
                let codec = desired.codec();
                let encoder = backend
                    .encoder_for(codec)
                    .unwrap_or_else(|| codec.software_encoder().to_owned());
                let mode = AccelerationMode::Hardware {
                    backend,
                    decoder: backend.decoder_for(codec),
                    encoder,
                };
                (desired, codec, mode)
            }
            None => {
                let tier = self.software_tier(desired);
                let mut codec = tier.codec();
                if !caps.software_encode.contains(&codec) {
                    codec = Codec::H264;
                }
                let mode = AccelerationMode::Software {
                    encoder: codec.software_encoder().to_owned(),
                };
                (tier, codec, mode)
            }
        };

        let spec = PipelineSpec {
            session: request.session,
            channel_id: request.channel.id.clone(),
            source: request.channel.url.clone(),
            tier,
            desired_tier: desired,
            codec,
            acceleration,
            rendition: tier.rendition(),
            route: request.route.clone(),
            generation,
            degraded: tier < desired,
        };
        debug!(spec = %spec, "pipeline configured");
        spec
    }

    /// Step down one tier at a time until software can carry it.
    fn software_tier(&self, desired: QualityTier) -> QualityTier {
        let mut tier = desired;
        while tier > self.policy.software_max_tier {
            match tier.down() {
                Some(lower) => tier = lower,
                None => break,
            }
        }
        tier
    }
}

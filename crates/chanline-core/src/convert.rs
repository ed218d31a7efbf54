// ── API-to-domain type conversions ──
//
// Bridges raw `chanline-api` reports into canonical domain types.

use std::collections::BTreeSet;

use chanline_api::{EngineCapabilities, Measurement, OpenRequest};
use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;

use crate::model::{
    AccelerationMode, CapabilitySnapshot, Codec, DeviceInfo, HardwareBackend, NetworkSample,
    PipelineSpec,
};

/// Derive a capability snapshot from an engine listing.
///
/// CUDA additionally requires a visible device: stock ffmpeg builds list
/// NVENC encoders whether or not a GPU is present.
pub fn snapshot_from_engine(
    raw: &EngineCapabilities,
    session_budget: u32,
    probed_at: DateTime<Utc>,
) -> CapabilitySnapshot {
    let decode: BTreeSet<Codec> = Codec::iter()
        .filter(|c| raw.has_decoder(c.ffmpeg_name()))
        .collect();
    let software_encode: BTreeSet<Codec> = Codec::iter()
        .filter(|c| raw.has_encoder(c.software_encoder()))
        .collect();

    let usable = |b: HardwareBackend| {
        raw.has_hwaccel(b.hwaccel_name())
            && (b != HardwareBackend::Cuda || !raw.devices.is_empty())
            && Codec::iter().any(|c| b.encoder_for(c).is_some_and(|name| raw.has_encoder(&name)))
    };
    let backend = HardwareBackend::iter().find(|b| usable(*b));

    let (hw_decode, hw_encode) = match backend {
        Some(backend) => {
            let hw_encode: BTreeSet<Codec> = Codec::iter()
                .filter(|c| {
                    backend
                        .encoder_for(*c)
                        .is_some_and(|name| raw.has_encoder(&name))
                })
                .collect();
            let hw_decode: BTreeSet<Codec> = Codec::iter()
                .filter(|c| match backend.decoder_for(*c) {
                    Some(name) => raw.has_decoder(&name),
                    None => decode.contains(c),
                })
                .collect();
            (hw_decode, hw_encode)
        }
        None => (BTreeSet::new(), BTreeSet::new()),
    };

    let encode = software_encode.union(&hw_encode).copied().collect();
    let hardware_available = backend.is_some() && !hw_encode.is_empty();

    let device = raw.devices.first().map(|d| DeviceInfo {
        name: d.name.clone(),
        memory_mb: d.memory_mb,
        session_budget,
    });
    // Non-CUDA backends rarely report a device; the budget still applies.
    let device = match (device, hardware_available) {
        (Some(device), _) => Some(device),
        (None, true) => Some(DeviceInfo {
            name: backend.map_or_else(String::new, |b| b.to_string()),
            memory_mb: 0,
            session_budget,
        }),
        (None, false) => None,
    };

    CapabilitySnapshot {
        decode,
        encode,
        software_encode,
        hw_decode,
        hw_encode,
        backend,
        hardware_available,
        device,
        engine_version: raw.version.clone(),
        probed_at: Some(probed_at),
    }
}

/// Translate a pipeline spec into an engine open request.
pub fn open_request(spec: &PipelineSpec) -> OpenRequest {
    let (hwaccel, decoder) = match &spec.acceleration {
        AccelerationMode::Hardware {
            backend, decoder, ..
        } => (Some(backend.hwaccel_name().to_owned()), decoder.clone()),
        AccelerationMode::Software { .. } => (None, None),
    };

    OpenRequest {
        label: spec.label(),
        source: spec.source.clone(),
        proxy: spec.route.endpoint().cloned(),
        hwaccel,
        decoder,
        encoder: spec.acceleration.encoder().to_owned(),
        width: spec.rendition.width,
        height: spec.rendition.height,
        video_bitrate_kbps: spec.rendition.video_bitrate_kbps,
    }
}

pub fn sample_from_measurement(m: &Measurement, timestamp: DateTime<Utc>) -> NetworkSample {
    NetworkSample {
        bandwidth_mbps: m.bandwidth_mbps,
        latency_ms: m.latency_ms,
        jitter_ms: m.jitter_ms,
        packet_loss: m.packet_loss.clamp(0.0, 1.0),
        timestamp,
        measured: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanline_api::GpuDevice;
    use pretty_assertions::assert_eq;

    fn listing(devices: Vec<GpuDevice>) -> EngineCapabilities {
        EngineCapabilities {
            version: Some("7.0".into()),
            hwaccels: vec!["cuda".into(), "vaapi".into()],
            decoders: vec!["h264".into(), "hevc".into(), "h264_cuvid".into(), "hevc_cuvid".into()],
            encoders: vec!["libx264".into(), "h264_nvenc".into(), "hevc_nvenc".into()],
            devices,
        }
    }

    #[test]
    fn cuda_with_device() {
        let gpu = GpuDevice {
            name: "RTX 4070".into(),
            memory_mb: 12282,
        };
        let snap = snapshot_from_engine(&listing(vec![gpu]), 3, Utc::now());

        assert_eq!(snap.backend, Some(HardwareBackend::Cuda));
        assert!(snap.hardware_supports(Codec::Hevc));
        assert_eq!(snap.software_encode, BTreeSet::from([Codec::H264]));
        assert_eq!(snap.encode, BTreeSet::from([Codec::H264, Codec::Hevc]));
        assert_eq!(snap.hardware_session_budget(), 3);
    }

    #[test]
    fn cuda_without_device_is_not_hardware() {
        let snap = snapshot_from_engine(&listing(Vec::new()), 3, Utc::now());

        // vaapi is listed but has no encoders either.
        assert_eq!(snap.backend, None);
        assert!(!snap.hardware_available);
        assert!(snap.device.is_none());
        assert!(snap.hw_encode.is_empty());
    }

    #[test]
    fn vaapi_uses_native_decoders() {
        let mut raw = listing(Vec::new());
        raw.encoders.push("h264_vaapi".into());
        let snap = snapshot_from_engine(&raw, 2, Utc::now());

        assert_eq!(snap.backend, Some(HardwareBackend::Vaapi));
        assert!(snap.hardware_supports(Codec::H264));
        assert!(!snap.hardware_supports(Codec::Hevc));
        assert_eq!(snap.device.map(|d| d.session_budget), Some(2));
    }
}

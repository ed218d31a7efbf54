//! Capability probe handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytesize::ByteSize;

use chanline_config::Config;
use chanline_core::{CapabilitySnapshot, Codec};

use crate::cli::{GlobalOpts, ProbeArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn codecs(set: &BTreeSet<Codec>) -> String {
    if set.is_empty() {
        return "-".into();
    }
    set.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn detail(s: &CapabilitySnapshot) -> String {
    let mut lines = vec![
        format!("Engine:     {}", s.engine_version.as_deref().unwrap_or("unknown")),
        format!(
            "Hardware:   {}",
            match (s.hardware_available, s.backend) {
                (true, Some(backend)) => backend.to_string(),
                _ => "none (software only)".into(),
            }
        ),
    ];
    if let Some(ref device) = s.device {
        lines.push(format!("Device:     {}", device.name));
        lines.push(format!("Memory:     {}", ByteSize::mib(device.memory_mb)));
        lines.push(format!("Sessions:   {} concurrent", device.session_budget));
    }
    lines.extend([
        format!("Decode:     {}", codecs(&s.decode)),
        format!("Encode:     {}", codecs(&s.encode)),
        format!("HW decode:  {}", codecs(&s.hw_decode)),
        format!("HW encode:  {}", codecs(&s.hw_encode)),
        format!(
            "Probed:     {}",
            s.probed_at
                .map_or_else(|| "never".into(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        ),
    ]);
    lines.join("\n")
}

fn backend_id(s: &CapabilitySnapshot) -> String {
    s.backend
        .filter(|_| s.hardware_available)
        .map_or_else(|| "software".into(), |b| b.to_string())
}

pub async fn handle(args: ProbeArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot: Arc<CapabilitySnapshot> = if args.cached {
        chanline_config::load_state(&chanline_config::state_path())?
            .and_then(|state| state.capabilities)
            .map(Arc::new)
            .ok_or_else(|| CliError::NotFound {
                resource_type: "capability snapshot".into(),
                identifier: "cache".into(),
                list_command: "probe".into(),
            })?
    } else {
        let orch = util::orchestrator(cfg, global, false).await?;
        let pb = util::spinner(global, "Probing transcode engine");
        let result = orch.reprobe().await;
        pb.finish_and_clear();
        let snapshot = result?;
        util::persist(&orch, global);
        snapshot
    };

    let out = output::render_single(
        util::output_format(global),
        snapshot.as_ref(),
        detail,
        backend_id,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

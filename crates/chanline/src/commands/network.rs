//! Network telemetry handlers.

use futures_util::StreamExt;
use tracing::debug;

use chanline_config::Config;
use chanline_core::NetworkReading;

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(r: &NetworkReading, color: bool) -> String {
    let s = &r.sample;
    let mut lines = vec![format!("Class:      {}", output::paint_class(r.class, color))];
    if s.measured {
        lines.extend([
            format!("Bandwidth:  {:.1} Mbps", s.bandwidth_mbps),
            format!("Latency:    {:.1} ms", s.latency_ms),
            format!("Jitter:     {:.1} ms", s.jitter_ms),
            format!("Loss:       {:.2} %", s.packet_loss * 100.0),
        ]);
    } else {
        lines.push("Sample:     unmeasured (probe failed or timed out)".into());
    }
    lines.push(format!(
        "Taken:      {}",
        s.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

fn line(r: &NetworkReading, color: bool) -> String {
    let s = &r.sample;
    let time = s.timestamp.format("%H:%M:%S");
    let class = output::paint_class(r.class, color);
    if s.measured {
        format!(
            "{time}  {class:<9}  {:>7.1} Mbps  {:>6.1} ms  ±{:.1} ms  {:.2}% loss",
            s.bandwidth_mbps,
            s.latency_ms,
            s.jitter_ms,
            s.packet_loss * 100.0
        )
    } else {
        format!("{time}  {class:<9}  unmeasured")
    }
}

pub async fn handle(args: NetworkArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let format = util::output_format(global);
    let color = util::color_enabled(global);

    match args.command {
        NetworkCommand::Status => {
            let orch = util::orchestrator(cfg, global, false).await?;
            let pb = util::spinner(global, "Measuring network");
            let reading = orch.measure_now().await;
            pb.finish_and_clear();

            let out = output::render_single(
                format,
                &reading,
                |r| detail(r, color),
                |r| r.class.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworkCommand::Watch { count } => {
            let orch = util::orchestrator(cfg, global, true).await?;
            let mut readings = orch.watch_network().into_stream();
            let mut seen = 0usize;

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        debug!("interrupted");
                        break;
                    }
                    next = readings.next() => {
                        let Some(reading) = next else { break };
                        let out = output::render_stream_item(format, &reading, |r| line(r, color));
                        output::print_output(&out, global.quiet);
                        seen += 1;
                        if count.is_some_and(|n| seen >= n) {
                            break;
                        }
                    }
                }
            }

            orch.shutdown().await;
            util::persist(&orch, global);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanline_core::{NetworkSample, QualityClass};
    use chrono::Utc;

    #[test]
    fn unmeasured_readings_say_so() {
        let reading = NetworkReading::unmeasured(Utc::now());
        assert!(line(&reading, false).ends_with("unmeasured"));
        assert!(detail(&reading, false).contains("unmeasured"));
    }

    #[test]
    fn measured_line_shows_loss_as_percent() {
        let reading = NetworkReading {
            sample: NetworkSample {
                bandwidth_mbps: 42.0,
                latency_ms: 12.5,
                jitter_ms: 1.0,
                packet_loss: 0.004,
                timestamp: Utc::now(),
                measured: true,
            },
            class: QualityClass::Good,
        };
        let text = line(&reading, false);
        assert!(text.contains("42.0 Mbps"));
        assert!(text.contains("0.40% loss"));
    }
}

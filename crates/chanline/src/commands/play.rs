//! Playback handler: open a session and follow its events until the
//! stream ends, the duration elapses, or the user interrupts.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use chanline_config::Config;
use chanline_core::{FailureReason, SessionEvent, SessionState, SessionStatus};

use crate::cli::{GlobalOpts, PlayArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn describe(event: &SessionEvent, color: bool) -> String {
    match event {
        SessionEvent::StateChanged { state, .. } => {
            format!("state      {}", output::paint_state(*state, color))
        }
        SessionEvent::TierChanged { from, to, .. } => {
            let arrow = if to > from { "↑" } else { "↓" };
            format!("quality    {from} {arrow} {to}")
        }
        SessionEvent::Reconfigured {
            generation,
            tier,
            acceleration,
            ..
        } => format!("pipeline   #{generation} {tier} via {acceleration}"),
        SessionEvent::AdaptationFailed {
            generation, error, ..
        } => format!("adaptation #{generation} rejected, keeping current: {error}"),
        SessionEvent::Stopped { .. } => {
            format!("state      {}", output::paint_state(SessionState::Stopped, color))
        }
        SessionEvent::Failed { reason, .. } => format!(
            "state      {} ({reason})",
            output::paint_state(SessionState::Failed, color)
        ),
    }
}

fn summary(s: &SessionStatus) -> String {
    let elapsed = (Utc::now() - s.created_at)
        .to_std()
        .map(|d| Duration::from_secs(d.as_secs()))
        .unwrap_or_default();
    let mut lines = vec![
        format!("Session:    {}", s.id),
        format!("Channel:    {}", s.channel_id),
        format!("Requested:  {}", s.requested),
        format!("State:      {}", s.state),
        format!(
            "Tier:       {}{}",
            s.tier.map_or_else(|| "-".into(), |t| t.to_string()),
            if s.degraded { " (degraded)" } else { "" }
        ),
        format!(
            "Pipeline:   {}",
            s.acceleration
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string)
        ),
        format!("Swaps:      {}", s.generation),
        format!("Played:     {}", humantime::format_duration(elapsed)),
    ];
    if let Some(ref error) = s.last_error {
        lines.push(format!("Last error: {error}"));
    }
    lines.join("\n")
}

fn parse_duration(value: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(value).map_err(|e| CliError::Validation {
        field: "duration".into(),
        reason: e.to_string(),
    })
}

async fn sleep_or_forever(limit: Option<Duration>) {
    match limit {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

pub async fn handle(args: PlayArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let requested = match args.quality {
        Some(ref q) => util::parse_quality(q)?,
        None => cfg.default_quality()?,
    };
    let limit = args.duration.as_deref().map(parse_duration).transpose()?;
    let channel = util::resolve_channel(cfg, &args.channel, &args.nominal)?;
    let channel_name = channel.name.clone();

    let format = util::output_format(global);
    let color = util::color_enabled(global);

    let orch = util::orchestrator(cfg, global, true).await?;
    let mut events = orch.subscribe_events();
    let handle = orch.select_channel(channel, requested).await;
    let id = handle.id();
    info!(session = %id, channel = %channel_name, %requested, "session opened");

    let deadline = sleep_or_forever(limit);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
            () = &mut deadline => {
                debug!("duration elapsed");
                break;
            }
            received = events.recv() => match received {
                Ok(event) if event.session() == id => {
                    let out = output::render_stream_item(format, &event, |e| describe(e, color));
                    output::print_output(&out, global.quiet);

                    if matches!(event, SessionEvent::StateChanged { state: SessionState::Playing, .. }) {
                        if let Some(path) = handle.status().output {
                            eprintln!("▶ Output: {path}");
                        }
                    }
                    if matches!(event, SessionEvent::Stopped { .. } | SessionEvent::Failed { .. }) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    let status = match orch.stop_session(id).await {
        Ok(status) => status,
        Err(e) => {
            debug!(error = %e, "session already gone");
            handle.stop().await
        }
    };
    orch.shutdown().await;
    util::persist(&orch, global);

    if status.state == SessionState::Failed {
        return Err(CliError::PlaybackFailed {
            channel: channel_name,
            reason: status.failure.unwrap_or(FailureReason::Engine),
            message: status
                .last_error
                .unwrap_or_else(|| "session failed".into()),
        });
    }

    let out = output::render_single(format, &status, summary, |s| s.state.to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chanline_core::{QualityTier, RequestedQuality, SessionId};

    #[test]
    fn tier_changes_show_direction() {
        let session = SessionId::new();
        let up = SessionEvent::TierChanged {
            session,
            from: QualityTier::Hd,
            to: QualityTier::Fhd,
        };
        let down = SessionEvent::TierChanged {
            session,
            from: QualityTier::Fhd,
            to: QualityTier::Sd,
        };
        assert_eq!(describe(&up, false), "quality    HD ↑ FHD");
        assert_eq!(describe(&down, false), "quality    FHD ↓ SD");
    }

    #[test]
    fn durations_use_humantime() {
        assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
        assert!(matches!(
            parse_duration("soon"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn summary_marks_degraded_sessions() {
        let mut status = SessionStatus::new(
            SessionId::new(),
            "news".into(),
            RequestedQuality::Fixed(QualityTier::Fhd),
        );
        status.state = SessionState::Stopped;
        status.tier = Some(QualityTier::Hd);
        status.degraded = true;
        let text = summary(&status);
        assert!(text.contains("HD (degraded)"));
        assert!(text.contains("Requested:  FHD"));
    }
}

//! Shared helpers for command handlers.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tracing::{debug, warn};
use url::Url;

use chanline_config::{Config, ConfiguredCredentials, Defaults};
use chanline_core::{Channel, Orchestrator, QualityTier, RequestedQuality};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Global option resolution ────────────────────────────────────────

/// Config file in effect: `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(chanline_config::config_path)
}

/// Fill unset `--output` / `--color` from the config file's defaults.
pub fn apply_defaults(global: &mut GlobalOpts, defaults: &Defaults) {
    if global.output.is_none() {
        global.output = OutputFormat::from_str(&defaults.output, true).ok();
    }
    if global.color.is_none() {
        global.color = ColorMode::from_str(&defaults.color, true).ok();
    }
}

pub fn output_format(global: &GlobalOpts) -> &OutputFormat {
    global.output.as_ref().unwrap_or(&OutputFormat::Table)
}

pub fn color_enabled(global: &GlobalOpts) -> bool {
    output::should_color(global.color.as_ref().unwrap_or(&ColorMode::Auto))
}

// ── Interaction ─────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// A password from the named env var, else from an interactive prompt.
pub fn read_secret(username: &str, password_env: Option<&str>) -> Result<SecretString, CliError> {
    if let Some(name) = password_env {
        return std::env::var(name)
            .map(SecretString::from)
            .map_err(|_| CliError::Validation {
                field: "password-env".into(),
                reason: format!("{name} is not set"),
            });
    }

    let pass = rpassword::prompt_password(format!("Password for {username}: "))
        .map_err(prompt_err)?;
    if pass.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(SecretString::from(pass))
}

/// Spinner on stderr; hidden in quiet mode or when stderr is not a terminal.
pub fn spinner(global: &GlobalOpts, message: &str) -> ProgressBar {
    if global.quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["▹▹▹▹▹", "▸▹▹▹▹", "▹▸▹▹▹", "▹▹▸▹▹", "▹▹▹▸▹", "▹▹▹▹▸", "▪▪▪▪▪"]),
    );
    pb.set_message(message.to_owned());
    pb
}

// ── Orchestrator bootstrap ──────────────────────────────────────────

/// Build an orchestrator from config and the state cache.
///
/// A proxy declared in the config file wins over the cached one. With
/// `start` the engine is probed and the telemetry loop runs.
pub async fn orchestrator(
    cfg: &Config,
    global: &GlobalOpts,
    start: bool,
) -> Result<Orchestrator, CliError> {
    let orch = Orchestrator::new(cfg.engine_config()?, cfg.build_services()?);

    if !global.no_cache {
        match chanline_config::load_state(&chanline_config::state_path()) {
            Ok(Some(mut state)) => {
                if !cfg.proxy.host.is_empty() {
                    state.proxy = None;
                }
                if let Err(e) = orch.restore(state, &ConfiguredCredentials::new(cfg)).await {
                    warn!(error = %e, "cached proxy no longer usable, going direct");
                }
            }
            Ok(None) => debug!("no state cache yet"),
            Err(e) => warn!(error = %e, "ignoring unreadable state cache"),
        }
    }

    if cfg.proxy.enabled {
        let route = orch.set_proxy_config(cfg.proxy_config()?).await?;
        debug!(%route, "proxy applied");
    }

    if start {
        let pb = spinner(global, "Probing engine and network");
        orch.start().await;
        pb.finish_and_clear();
    }
    Ok(orch)
}

/// Save what the orchestrator learned for the next run.
pub fn persist(orch: &Orchestrator, global: &GlobalOpts) {
    if global.no_cache {
        return;
    }
    let path = chanline_config::state_path();
    if let Err(e) = chanline_config::save_state(&path, &orch.snapshot_state()) {
        warn!(error = %e, path = %path.display(), "failed to save state cache");
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

pub fn parse_quality(value: &str) -> Result<RequestedQuality, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: "quality".into(),
        reason: format!("expected auto, SD, HD, FHD or 4K, got '{value}'"),
    })
}

pub fn parse_tier(field: &str, value: &str) -> Result<QualityTier, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected SD, HD, FHD or 4K, got '{value}'"),
    })
}

/// Catalog channel by id or name, else an ad-hoc channel for a stream URL.
pub fn resolve_channel(cfg: &Config, key: &str, nominal: &str) -> Result<Channel, CliError> {
    if let Some(channel) = cfg.find_channel(key)? {
        return Ok(channel);
    }

    match Url::parse(key) {
        Ok(url) if url.has_host() => {
            let nominal_quality = parse_tier("nominal", nominal)?;
            let id = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|last| last.split('.').next())
                .filter(|stem| !stem.is_empty())
                .or_else(|| url.host_str())
                .unwrap_or("stream")
                .to_owned();
            Ok(Channel {
                id,
                name: key.to_owned(),
                url,
                nominal_quality,
                category: None,
            })
        }
        _ => Err(CliError::NotFound {
            resource_type: "channel".into(),
            identifier: key.into(),
            list_command: "channels list".into(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chanline_config::ChannelEntry;

    fn catalog() -> Config {
        let mut cfg = Config::default();
        cfg.channels.push(ChannelEntry {
            id: "news".into(),
            name: "News 24".into(),
            url: "https://example.com/news/index.m3u8".into(),
            quality: "HD".into(),
            category: None,
        });
        cfg
    }

    #[test]
    fn catalog_channels_win() {
        let channel = resolve_channel(&catalog(), "News 24", "FHD").unwrap();
        assert_eq!(channel.id, "news");
        assert_eq!(channel.nominal_quality, QualityTier::Hd);
    }

    #[test]
    fn urls_become_ad_hoc_channels() {
        let channel =
            resolve_channel(&catalog(), "https://cdn.example.com/live/sports.m3u8", "4K").unwrap();
        assert_eq!(channel.id, "sports");
        assert_eq!(channel.nominal_quality, QualityTier::Uhd4k);
    }

    #[test]
    fn unknown_names_are_not_found() {
        let err = resolve_channel(&catalog(), "weather", "FHD").unwrap_err();
        assert!(matches!(err, CliError::NotFound { .. }));
    }

    #[test]
    fn quality_accepts_auto_and_aliases() {
        assert_eq!(parse_quality("AUTO").unwrap(), RequestedQuality::Auto);
        assert_eq!(
            parse_quality("720p").unwrap(),
            RequestedQuality::Fixed(QualityTier::Hd)
        );
        assert!(parse_quality("8K").is_err());
    }
}

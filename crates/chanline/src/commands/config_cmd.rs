//! Config subcommand handlers.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use chanline_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

const SETTABLE_KEYS: &[&str] = &[
    "defaults.output",
    "defaults.color",
    "engine.ffmpeg",
    "engine.device_query",
    "engine.output_dir",
    "engine.session_budget",
    "engine.software_max_tier",
    "telemetry.interval_ms",
    "telemetry.latency_url",
    "telemetry.download_url",
    "quality.default",
    "quality.upgrade_dwell_secs",
    "quality.downgrade_after",
    "session.multi_view",
    "session.retry_attempts",
    "proxy.check_url",
];

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.proxy.password.is_some() {
        shown.proxy.password = Some("****".into());
    }
    shown
}

fn as_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

/// An empty value clears an optional path.
fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn set_key(cfg: &mut Config, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "defaults.output" => cfg.defaults.output = value.into(),
        "defaults.color" => cfg.defaults.color = value.into(),
        "engine.ffmpeg" => cfg.engine.ffmpeg = value.into(),
        "engine.device_query" => cfg.engine.device_query = optional_path(value),
        "engine.output_dir" => cfg.engine.output_dir = optional_path(value),
        "engine.session_budget" => {
            cfg.engine.session_budget = parse(key, value, "a whole number")?;
        }
        "engine.software_max_tier" => {
            util::parse_tier(key, value)?;
            cfg.engine.software_max_tier = value.into();
        }
        "telemetry.interval_ms" => {
            cfg.telemetry.interval_ms = parse(key, value, "a number (milliseconds)")?;
        }
        "telemetry.latency_url" => cfg.telemetry.latency_url = value.into(),
        "telemetry.download_url" => cfg.telemetry.download_url = value.into(),
        "quality.default" => {
            util::parse_quality(value)?;
            cfg.quality.default = value.into();
        }
        "quality.upgrade_dwell_secs" => {
            cfg.quality.upgrade_dwell_secs = parse(key, value, "a number (seconds)")?;
        }
        "quality.downgrade_after" => {
            cfg.quality.downgrade_after = parse(key, value, "a whole number")?;
        }
        "session.multi_view" => {
            cfg.session.multi_view = parse(key, value, "'true' or 'false'")?;
        }
        "session.retry_attempts" => {
            cfg.session.retry_attempts = parse(key, value, "a whole number")?;
        }
        "proxy.check_url" => cfg.proxy.check_url = value.into(),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: {}",
                    SETTABLE_KEYS.join(", ")
                ),
            });
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct Paths {
    config: PathBuf,
    state: PathBuf,
    streams: PathBuf,
}

/// Print file locations. Works without a loadable config.
pub fn print_paths(global: &GlobalOpts) {
    let paths = Paths {
        config: util::config_file(global),
        state: chanline_config::state_path(),
        streams: chanline_config::stream_dir(),
    };
    let out = output::render_single(
        util::output_format(global),
        &paths,
        |p| {
            format!(
                "Config:   {}\nState:    {}\nStreams:  {}",
                p.config.display(),
                p.state.display(),
                p.streams.display()
            )
        },
        |p| p.config.display().to_string(),
    );
    output::print_output(&out, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, mut cfg: Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let shown = redacted(&cfg);
            let out = output::render_single(util::output_format(global), &shown, as_toml, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            print_paths(global);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            set_key(&mut cfg, &key, &value)?;
            cfg.validate()?;
            let path = util::config_file(global);
            chanline_config::save_config_to(&cfg, &path)?;
            eprintln!("✓ Set {key} in {}", path.display());
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let proxy = &cfg.proxy;
            let Some(ref username) = proxy.username else {
                return Err(CliError::Validation {
                    field: "proxy.username".into(),
                    reason: "configure a proxy user first: chanline proxy set <host> -u <user>"
                        .into(),
                });
            };
            if proxy.host.is_empty() {
                return Err(CliError::Validation {
                    field: "proxy.host".into(),
                    reason: "no proxy host configured".into(),
                });
            }

            let secret = util::read_secret(username, None)?;
            chanline_config::store_proxy_password(&proxy.host, username, &secret)?;
            eprintln!("✓ Password for {username}@{} stored in system keyring", proxy.host);
            Ok(())
        }
    }
}

//! Configuration for the chanline CLI.
//!
//! TOML file + `CHANLINE_` environment overrides, proxy credential
//! resolution (env + keyring + plaintext), the channel catalog, and the
//! persisted state cache. Everything here ends in plain `chanline_core`
//! values; the core never reads files itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use chanline_api::{
    FfmpegEngine, FfmpegOptions, HttpProber, HttpProberConfig, HttpRouteChecker, TransportConfig,
};
use chanline_core::{
    AdaptationPolicy, Channel, ClassThreshold, CredentialStore, EngineConfig, PersistedState,
    PipelinePolicy, ProbeConfig, ProxyConfig, ProxyCredentials, ProxyScheme, QualityThresholds,
    QualityTier, RequestedQuality, RetryPolicy, Services, TelemetryConfig,
};

const KEYRING_SERVICE: &str = "chanline";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for proxy user '{username}' at {host}")]
    NoCredentials { host: String, username: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("state cache is corrupt: {0}")]
    State(#[from] serde_json::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to build service: {0}")]
    Service(#[from] chanline_api::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,

    #[serde(default)]
    pub quality: QualitySection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub proxy: ProxySection,

    /// Channel catalog.
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// Transcode engine and hardware settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSection {
    /// ffmpeg binary; a bare name resolves through PATH.
    pub ffmpeg: PathBuf,

    /// GPU inventory tool. Empty disables device discovery.
    pub device_query: Option<PathBuf>,

    /// Where HLS output lands. Defaults to the platform cache dir.
    pub output_dir: Option<PathBuf>,

    pub probe_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub segment_seconds: u32,

    /// Concurrent hardware sessions per device.
    pub session_budget: u32,

    /// Acceleration failures before capabilities are re-probed.
    pub reprobe_after_failures: u32,

    /// Highest tier trusted to software transcoding.
    pub software_max_tier: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        let ffmpeg = FfmpegOptions::default();
        let probe = ProbeConfig::default();
        Self {
            ffmpeg: ffmpeg.program,
            device_query: ffmpeg.device_query,
            output_dir: None,
            probe_timeout_secs: probe.timeout.as_secs(),
            ready_timeout_secs: ffmpeg.ready_timeout.as_secs(),
            segment_seconds: ffmpeg.segment_seconds,
            session_budget: probe.session_budget,
            reprobe_after_failures: probe.reprobe_after_failures,
            software_max_tier: PipelinePolicy::default().software_max_tier.to_string(),
        }
    }
}

/// Network measurement settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub latency_url: String,
    pub download_url: String,
    pub interval_ms: u64,
    /// Relative spread around the interval, `0.25` is ±25 %.
    pub jitter: f64,
    pub history: usize,
    pub ping_count: u32,
    pub max_download_bytes: u64,
    pub measure_timeout_secs: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        let t = TelemetryConfig::default();
        Self {
            latency_url: "https://www.gstatic.com/generate_204".into(),
            download_url: "https://speed.cloudflare.com/__down?bytes=4000000".into(),
            interval_ms: duration_ms(t.interval),
            jitter: t.jitter,
            history: t.history,
            ping_count: 5,
            max_download_bytes: 4_000_000,
            measure_timeout_secs: t.measure_timeout.as_secs(),
        }
    }
}

/// Adaptive quality settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QualitySection {
    /// Quality requested when none is given: `auto`, `SD`, `HD`, `FHD`, `4K`.
    pub default: String,
    pub upgrade_dwell_secs: u64,
    pub downgrade_after: u32,
    pub thresholds: ThresholdsSection,
}

impl Default for QualitySection {
    fn default() -> Self {
        let policy = AdaptationPolicy::default();
        Self {
            default: RequestedQuality::Auto.to_string(),
            upgrade_dwell_secs: policy.upgrade_dwell.as_secs(),
            downgrade_after: policy.downgrade_after,
            thresholds: ThresholdsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdsSection {
    pub excellent: ThresholdEntry,
    pub good: ThresholdEntry,
    pub fair: ThresholdEntry,
}

impl Default for ThresholdsSection {
    fn default() -> Self {
        let t = QualityThresholds::default();
        Self {
            excellent: t.excellent.into(),
            good: t.good.into(),
            fair: t.fair.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ThresholdEntry {
    pub min_bandwidth_mbps: f64,
    pub max_latency_ms: f64,
    pub max_packet_loss: f64,
}

impl From<ClassThreshold> for ThresholdEntry {
    fn from(t: ClassThreshold) -> Self {
        Self {
            min_bandwidth_mbps: t.min_bandwidth_mbps,
            max_latency_ms: t.max_latency_ms,
            max_packet_loss: t.max_packet_loss,
        }
    }
}

impl From<ThresholdEntry> for ClassThreshold {
    fn from(t: ThresholdEntry) -> Self {
        Self {
            min_bandwidth_mbps: t.min_bandwidth_mbps,
            max_latency_ms: t.max_latency_ms,
            max_packet_loss: t.max_packet_loss,
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSection {
    /// Keep running sessions when another channel is selected.
    pub multi_view: bool,
    pub retry_base_ms: u64,
    pub retry_factor: u32,
    pub retry_attempts: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            multi_view: false,
            retry_base_ms: duration_ms(retry.base_delay),
            retry_factor: retry.factor,
            retry_attempts: retry.max_attempts,
        }
    }
}

/// Optional outbound proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySection {
    pub enabled: bool,
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u32,
    pub username: Option<String>,

    /// Proxy password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the proxy password.
    pub password_env: Option<String>,

    /// URL requested through the proxy to prove the route works.
    pub check_url: String,

    pub check_timeout_secs: u64,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: ProxyScheme::Http,
            host: String::new(),
            port: 8080,
            username: None,
            password: None,
            password_env: None,
            check_url: "https://www.gstatic.com/generate_204".into(),
            check_timeout_secs: 5,
        }
    }
}

/// One `[[channels]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelEntry {
    pub id: String,
    pub name: String,
    pub url: String,

    /// Best tier the source offers.
    #[serde(default = "default_channel_quality")]
    pub quality: String,

    pub category: Option<String>,
}

fn default_channel_quality() -> String {
    QualityTier::Fhd.to_string()
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "chanline")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("chanline");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the persisted state cache lives.
pub fn state_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("state.json"),
        |dirs| dirs.data_dir().join("state.json"),
    )
}

/// Default root for pipeline output.
pub fn stream_dir() -> PathBuf {
    project_dirs().map_or_else(
        || std::env::temp_dir().join("chanline"),
        |dirs| dirs.cache_dir().join("streams"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an error.
///
/// Nested keys use a double underscore: `CHANLINE_TELEMETRY__INTERVAL_MS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CHANLINE_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %e, "using default configuration");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_config()?;
        self.default_quality()?;
        self.channels()?;
        Url::parse(&self.proxy.check_url).map_err(|e| invalid("proxy.check_url", e.to_string()))?;
        Ok(())
    }

    /// Quality used when the caller does not ask for one.
    pub fn default_quality(&self) -> Result<RequestedQuality, ConfigError> {
        self.quality.default.parse().map_err(|_| {
            invalid(
                "quality.default",
                format!("expected auto, SD, HD, FHD or 4K, got '{}'", self.quality.default),
            )
        })
    }

    /// Build the runtime orchestration config.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let t = &self.telemetry;
        if t.interval_ms == 0 {
            return Err(invalid("telemetry.interval_ms", "must be positive"));
        }
        if !(0.0..1.0).contains(&t.jitter) {
            return Err(invalid("telemetry.jitter", "must be in [0, 1)"));
        }
        if t.history == 0 {
            return Err(invalid("telemetry.history", "must be positive"));
        }

        let thresholds = QualityThresholds {
            excellent: self.quality.thresholds.excellent.into(),
            good: self.quality.thresholds.good.into(),
            fair: self.quality.thresholds.fair.into(),
        };
        check_thresholds(&thresholds)?;

        if self.session.retry_attempts == 0 {
            return Err(invalid("session.retry_attempts", "must be at least 1"));
        }

        let software_max_tier: QualityTier = self.engine.software_max_tier.parse().map_err(|_| {
            invalid(
                "engine.software_max_tier",
                format!("unknown tier '{}'", self.engine.software_max_tier),
            )
        })?;

        Ok(EngineConfig {
            telemetry: TelemetryConfig {
                interval: Duration::from_millis(t.interval_ms),
                jitter: t.jitter,
                history: t.history,
                measure_timeout: Duration::from_secs(t.measure_timeout_secs),
                thresholds,
            },
            adaptation: AdaptationPolicy {
                upgrade_dwell: Duration::from_secs(self.quality.upgrade_dwell_secs),
                downgrade_after: self.quality.downgrade_after.max(1),
            },
            retry: RetryPolicy {
                base_delay: Duration::from_millis(self.session.retry_base_ms),
                factor: self.session.retry_factor.max(1),
                max_attempts: self.session.retry_attempts,
            },
            probe: ProbeConfig {
                timeout: Duration::from_secs(self.engine.probe_timeout_secs),
                reprobe_after_failures: self.engine.reprobe_after_failures,
                session_budget: self.engine.session_budget,
            },
            pipeline: PipelinePolicy { software_max_tier },
            multi_view: self.session.multi_view,
        })
    }

    /// The channel catalog. Ids must be unique.
    pub fn channels(&self) -> Result<Vec<Channel>, ConfigError> {
        let mut seen = HashSet::new();
        self.channels
            .iter()
            .map(|entry| {
                if !seen.insert(entry.id.as_str()) {
                    return Err(invalid("channels", format!("duplicate id '{}'", entry.id)));
                }
                entry.to_channel()
            })
            .collect()
    }

    /// Look a channel up by id, or by name ignoring case.
    pub fn find_channel(&self, key: &str) -> Result<Option<Channel>, ConfigError> {
        let entry = self
            .channels
            .iter()
            .find(|c| c.id == key)
            .or_else(|| self.channels.iter().find(|c| c.name.eq_ignore_ascii_case(key)));
        entry.map(ChannelEntry::to_channel).transpose()
    }

    /// The configured proxy with its secret resolved.
    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        let p = &self.proxy;
        if p.enabled && p.host.trim().is_empty() {
            return Err(invalid("proxy.host", "required when the proxy is enabled"));
        }
        let credentials = match p.username {
            Some(ref username) => {
                let password = resolve_proxy_password(p, username).ok_or_else(|| {
                    ConfigError::NoCredentials {
                        host: p.host.clone(),
                        username: username.clone(),
                    }
                })?;
                Some(ProxyCredentials {
                    username: username.clone(),
                    password,
                })
            }
            None => None,
        };
        Ok(ProxyConfig {
            enabled: p.enabled,
            scheme: p.scheme,
            host: p.host.clone(),
            port: p.port,
            credentials,
        })
    }

    pub fn ffmpeg_options(&self) -> FfmpegOptions {
        FfmpegOptions {
            program: self.engine.ffmpeg.clone(),
            device_query: self
                .engine
                .device_query
                .clone()
                .filter(|p| !p.as_os_str().is_empty()),
            output_dir: self.engine.output_dir.clone().unwrap_or_else(stream_dir),
            command_timeout: Duration::from_secs(self.engine.probe_timeout_secs),
            ready_timeout: Duration::from_secs(self.engine.ready_timeout_secs),
            segment_seconds: self.engine.segment_seconds,
        }
    }

    pub fn prober_config(&self) -> Result<HttpProberConfig, ConfigError> {
        let t = &self.telemetry;
        let timeout = Duration::from_secs(t.measure_timeout_secs);
        Ok(HttpProberConfig {
            latency_url: Url::parse(&t.latency_url)
                .map_err(|e| invalid("telemetry.latency_url", e.to_string()))?,
            download_url: Url::parse(&t.download_url)
                .map_err(|e| invalid("telemetry.download_url", e.to_string()))?,
            ping_count: t.ping_count.max(1),
            max_download_bytes: t.max_download_bytes,
            transport: TransportConfig {
                timeout,
                connect_timeout: timeout,
                proxy: None,
            },
        })
    }

    /// Wire up the production engine, prober and route checker.
    pub fn build_services(&self) -> Result<Services, ConfigError> {
        let check_url =
            Url::parse(&self.proxy.check_url).map_err(|e| invalid("proxy.check_url", e.to_string()))?;
        Ok(Services {
            engine: Arc::new(FfmpegEngine::new(self.ffmpeg_options())),
            network: Arc::new(HttpProber::new(self.prober_config()?)?),
            route_checker: Arc::new(HttpRouteChecker::new(
                check_url,
                Duration::from_secs(self.proxy.check_timeout_secs),
            )),
        })
    }
}

impl ChannelEntry {
    pub fn to_channel(&self) -> Result<Channel, ConfigError> {
        if self.id.trim().is_empty() {
            return Err(invalid("channels.id", "must not be empty"));
        }
        let url = Url::parse(&self.url)
            .map_err(|e| invalid("channels.url", format!("{}: {e}", self.id)))?;
        let nominal_quality: QualityTier = self.quality.parse().map_err(|_| {
            invalid(
                "channels.quality",
                format!("{}: unknown tier '{}'", self.id, self.quality),
            )
        })?;
        Ok(Channel {
            id: self.id.clone(),
            name: self.name.clone(),
            url,
            nominal_quality,
            category: self.category.clone(),
        })
    }
}

/// Better classes must demand at least as much as worse ones.
fn check_thresholds(t: &QualityThresholds) -> Result<(), ConfigError> {
    let ladder = [("excellent", t.excellent), ("good", t.good), ("fair", t.fair)];
    for (name, th) in ladder {
        if th.min_bandwidth_mbps < 0.0 || th.max_latency_ms <= 0.0 {
            return Err(invalid(
                &format!("quality.thresholds.{name}"),
                "bandwidth must be non-negative and latency positive",
            ));
        }
        if !(0.0..=1.0).contains(&th.max_packet_loss) {
            return Err(invalid(
                &format!("quality.thresholds.{name}.max_packet_loss"),
                "must be a fraction in [0, 1]",
            ));
        }
    }
    for pair in ladder.windows(2) {
        let [(better, b), (worse, w)] = pair else {
            continue;
        };
        if b.min_bandwidth_mbps < w.min_bandwidth_mbps
            || b.max_latency_ms > w.max_latency_ms
            || b.max_packet_loss > w.max_packet_loss
        {
            return Err(invalid(
                "quality.thresholds",
                format!("'{better}' must be at least as strict as '{worse}'"),
            ));
        }
    }
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_user(host: &str, username: &str) -> String {
    format!("proxy/{username}@{host}")
}

/// Look a proxy secret up in the system keyring.
pub fn keyring_password(host: &str, username: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(host, username)).ok()?;
    match entry.get_password() {
        Ok(secret) => Some(SecretString::from(secret)),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            debug!(error = %e, "keyring lookup failed");
            None
        }
    }
}

/// Store a proxy secret in the system keyring.
pub fn store_proxy_password(
    host: &str,
    username: &str,
    password: &SecretString,
) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(host, username))?;
    entry.set_password(password.expose_secret())?;
    Ok(())
}

/// Remove a stored proxy secret. Missing entries are fine.
pub fn delete_proxy_password(host: &str, username: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(host, username))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Resolve the proxy secret: env var, then keyring, then plaintext.
pub fn resolve_proxy_password(proxy: &ProxySection, username: &str) -> Option<SecretString> {
    // 1. Named env var
    if let Some(ref env_name) = proxy.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_password(&proxy.host, username) {
        return Some(secret);
    }

    // 3. Plaintext in config
    proxy.password.clone().map(SecretString::from)
}

/// Credential store backed by the config file's proxy section and the
/// system keyring.
#[derive(Debug, Clone)]
pub struct ConfiguredCredentials {
    proxy: ProxySection,
}

impl ConfiguredCredentials {
    pub fn new(config: &Config) -> Self {
        Self {
            proxy: config.proxy.clone(),
        }
    }
}

impl CredentialStore for ConfiguredCredentials {
    fn proxy_password(&self, host: &str, username: &str) -> Option<SecretString> {
        if host == self.proxy.host && self.proxy.username.as_deref() == Some(username) {
            resolve_proxy_password(&self.proxy, username)
        } else {
            keyring_password(host, username)
        }
    }
}

// ── State cache ─────────────────────────────────────────────────────

/// Read the state cache. `None` when nothing was saved yet.
pub fn load_state(path: &Path) -> Result<Option<PersistedState>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(PersistedState::from_json(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write the state cache atomically.
pub fn save_state(path: &Path, state: &PersistedState) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, state.to_json()?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chanline_core::PersistedProxy;
    use pretty_assertions::assert_eq;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_match_runtime_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.engine_config().unwrap(), EngineConfig::default());
        assert_eq!(cfg.default_quality().unwrap(), RequestedQuality::Auto);
        assert!(cfg.channels().unwrap().is_empty());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.telemetry.history, 20);
    }

    #[test]
    fn file_overrides_sections_and_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[telemetry]
interval_ms = 2000

[quality]
default = "HD"
upgrade_dwell_secs = 45

[session]
multi_view = true

[[channels]]
id = "news"
name = "News 24"
url = "https://example.com/news.m3u8"
quality = "1080p"

[[channels]]
id = "film"
name = "Films"
url = "https://example.com/film.m3u8"
quality = "4K"
category = "movies"
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.telemetry.interval, Duration::from_secs(2));
        assert_eq!(engine.adaptation.upgrade_dwell, Duration::from_secs(45));
        assert!(engine.multi_view);
        assert_eq!(
            cfg.default_quality().unwrap(),
            RequestedQuality::Fixed(QualityTier::Hd)
        );

        let channels = cfg.channels().unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].nominal_quality, QualityTier::Fhd);
        assert_eq!(channels[1].nominal_quality, QualityTier::Uhd4k);
        assert_eq!(channels[1].category.as_deref(), Some("movies"));

        let found = cfg.find_channel("news 24").unwrap().unwrap();
        assert_eq!(found.id, "news");
        assert!(cfg.find_channel("sports").unwrap().is_none());
    }

    #[test]
    fn bad_channel_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[[channels]]
id = "broken"
name = "Broken"
url = "not a url"
"#,
        );
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "channels.url"));
    }

    #[test]
    fn duplicate_channel_ids_are_rejected() {
        let mut cfg = Config::default();
        let entry = ChannelEntry {
            id: "a".into(),
            name: "A".into(),
            url: "https://example.com/a.m3u8".into(),
            quality: "HD".into(),
            category: None,
        };
        cfg.channels = vec![entry.clone(), entry];
        assert!(matches!(
            cfg.channels().unwrap_err(),
            ConfigError::Validation { .. }
        ));
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let mut cfg = Config::default();
        cfg.quality.thresholds.good.min_bandwidth_mbps = 80.0;
        let err = cfg.engine_config().unwrap_err();
        assert!(err.to_string().contains("at least as strict"));
    }

    #[test]
    fn enabled_proxy_needs_a_host() {
        let mut cfg = Config::default();
        cfg.proxy.enabled = true;
        assert!(matches!(
            cfg.proxy_config().unwrap_err(),
            ConfigError::Validation { .. }
        ));
    }

    #[test]
    fn plaintext_proxy_password_is_last_resort() {
        let mut cfg = Config::default();
        cfg.proxy.enabled = true;
        cfg.proxy.host = "proxy.invalid.test".into();
        cfg.proxy.username = Some("viewer".into());
        cfg.proxy.password = Some("plain".into());

        let proxy = cfg.proxy_config().unwrap();
        let creds = proxy.credentials.unwrap();
        assert_eq!(creds.username, "viewer");
        assert_eq!(creds.password.expose_secret(), "plain");
    }

    #[test]
    fn empty_device_query_disables_discovery() {
        let mut cfg = Config::default();
        cfg.engine.device_query = Some(PathBuf::new());
        cfg.engine.output_dir = Some(PathBuf::from("/srv/streams"));
        let opts = cfg.ffmpeg_options();
        assert_eq!(opts.device_query, None);
        assert_eq!(opts.output_dir, PathBuf::from("/srv/streams"));
    }

    #[test]
    fn save_then_load_keeps_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.proxy.host = "proxy.lan".into();
        cfg.proxy.port = 3128;
        cfg.defaults.output = "json".into();

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.proxy.host, "proxy.lan");
        assert_eq!(loaded.proxy.port, 3128);
        assert_eq!(loaded.defaults.output, "json");
    }

    #[test]
    fn state_cache_round_trips_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert!(load_state(&path).unwrap().is_none());

        let state = PersistedState {
            proxy: Some(PersistedProxy {
                enabled: true,
                scheme: ProxyScheme::Http,
                host: "proxy.lan".into(),
                port: 3128,
                username: Some("viewer".into()),
            }),
            ..PersistedState::default()
        };
        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap().unwrap();
        assert_eq!(loaded.proxy, state.proxy);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_state(&path).unwrap_err(),
            ConfigError::State(_)
        ));
    }
}

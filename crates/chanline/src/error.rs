//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use chanline_config::ConfigError;
use chanline_core::{CoreError, FailureReason, ProbeError, ProxyError, SessionError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Engine ───────────────────────────────────────────────────────
    #[error("Transcode engine unavailable: {reason}")]
    #[diagnostic(
        code(chanline::engine_unavailable),
        help(
            "Install ffmpeg or point engine.ffmpeg at it:\n\
             chanline config set engine.ffmpeg /usr/local/bin/ffmpeg"
        )
    )]
    EngineUnavailable { reason: String },

    // ── Playback ─────────────────────────────────────────────────────
    #[error("Playback of '{channel}' failed ({reason}): {message}")]
    #[diagnostic(
        code(chanline::playback_failed),
        help("Check the stream URL and your network, then retry with -v for details.")
    )]
    PlaybackFailed {
        channel: String,
        reason: FailureReason,
        message: String,
    },

    // ── Proxy ────────────────────────────────────────────────────────
    #[error("Proxy rejected the credentials")]
    #[diagnostic(
        code(chanline::proxy_auth),
        help(
            "Store the right password with: chanline config set-password\n\
             Or pass --password-env to read it from the environment."
        )
    )]
    ProxyAuth,

    #[error("Proxy unreachable: {reason}")]
    #[diagnostic(
        code(chanline::proxy_unreachable),
        help("Check host and port, or test another proxy with: chanline proxy test <host>")
    )]
    ProxyUnreachable { reason: String },

    #[error("No password available for proxy user '{username}' at {host}")]
    #[diagnostic(
        code(chanline::no_credentials),
        help(
            "Store one with: chanline config set-password\n\
             Or set proxy.password_env to an environment variable name."
        )
    )]
    NoCredentials { host: String, username: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(chanline::not_found),
        help("Run: chanline {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(chanline::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(chanline::config),
        help("Inspect the file with: chanline config path")
    )]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(chanline::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(chanline::timeout),
        help("Raise engine.probe_timeout_secs or check that the engine responds.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(chanline::serialize))]
    Serialize(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ProxyAuth | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::EngineUnavailable { .. } => exit_code::NOT_FOUND,
            Self::ProxyUnreachable { .. } => exit_code::CONNECTION,
            Self::PlaybackFailed { reason, .. } => match reason {
                FailureReason::Network | FailureReason::UnreachableSource => exit_code::CONNECTION,
                FailureReason::Engine => exit_code::NOT_FOUND,
                FailureReason::Acceleration | FailureReason::Codec => exit_code::GENERAL,
            },
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Source error mapping ─────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { host, username } => Self::NoCredentials { host, username },
            other => Self::Config(other),
        }
    }
}

impl From<ProxyError> for CliError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::AuthFailed => Self::ProxyAuth,
            ProxyError::ConnectionRefused(reason) => Self::ProxyUnreachable { reason },
            ProxyError::InvalidConfig(reason) => Self::Validation {
                field: "proxy".into(),
                reason,
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Probe(ProbeError::BackendUnavailable(reason)) => {
                Self::EngineUnavailable { reason }
            }
            CoreError::Probe(ProbeError::Timeout(after)) => Self::Timeout {
                seconds: after.as_secs(),
            },
            CoreError::Proxy(e) => e.into(),
            CoreError::Session(SessionError::RetriesExhausted {
                reason, last_error, ..
            }) => Self::PlaybackFailed {
                channel: "session".into(),
                reason,
                message: last_error,
            },
            CoreError::SessionNotFound { id } => Self::NotFound {
                resource_type: "session".into(),
                identifier: id.to_string(),
                list_command: "play".into(),
            },
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

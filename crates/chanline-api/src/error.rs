use thiserror::Error;

/// Top-level error type for the `chanline-api` crate.
///
/// Covers transport, proxy, and engine-process failures.
/// `chanline-core` maps these into its own domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or command timed out.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// No probe request reached its target.
    #[error("Measurement target unreachable: {0}")]
    Unreachable(String),

    // ── Proxy ───────────────────────────────────────────────────────
    /// Proxy answered 407.
    #[error("Proxy authentication required")]
    ProxyAuthRequired,

    /// TCP connection to the proxy failed.
    #[error("Proxy connection failed: {0}")]
    ProxyConnect(String),

    /// Proxy answered with a gateway error for the probe target.
    #[error("Proxy rejected the request (HTTP {status})")]
    ProxyRejected { status: u16 },

    /// Proxy endpoint could not be expressed as a proxy URL.
    #[error("Invalid proxy endpoint: {0}")]
    InvalidProxy(String),

    // ── Engine process ──────────────────────────────────────────────
    /// Engine binary missing from the filesystem or PATH.
    #[error("Engine binary not found: {program}")]
    EngineNotFound { program: String },

    /// Engine command ran but reported failure.
    #[error("{program} failed: {message}")]
    EngineCommand { program: String, message: String },

    /// Filesystem or process I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Unreachable(_) | Self::ProxyConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the engine itself could not be run.
    pub fn is_engine_missing(&self) -> bool {
        matches!(self, Self::EngineNotFound { .. })
    }
}

/// Why a transcode pipeline failed to reach first-frame-ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// The requested hardware path could not be initialized.
    #[error("Hardware acceleration unavailable: {0}")]
    AccelerationUnavailable(String),

    /// Decoder or encoder missing from the engine build.
    #[error("Codec unsupported: {0}")]
    CodecUnsupported(String),

    /// Source could not be fetched (network, proxy, or upstream error).
    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    /// The engine process could not be started or died unexpectedly.
    #[error("Transcode engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl OpenError {
    /// Returns `true` if a software retry might succeed.
    pub fn is_acceleration(&self) -> bool {
        matches!(self, Self::AccelerationUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(Error::Timeout { timeout_ms: 500 }.is_transient());
        assert!(Error::Unreachable("http://probe".into()).is_transient());
        assert!(Error::ProxyConnect("refused".into()).is_transient());
        assert!(!Error::ProxyAuthRequired.is_transient());
        assert!(!Error::ProxyRejected { status: 502 }.is_transient());
        assert!(
            !Error::EngineNotFound {
                program: "ffmpeg".into()
            }
            .is_transient()
        );
    }
}

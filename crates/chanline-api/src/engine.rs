// Transcode engine abstraction.
//
// The core never spawns processes itself; it talks to an engine through
// this trait so the session lifecycle can be exercised against mocks.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, OpenError};
use crate::transport::{ProxyEndpoint, ProxyScheme};

/// A hardware device reported by the engine host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub name: String,
    pub memory_mb: u64,
}

/// Raw capability report: what the engine binary was built with and
/// what hardware it can see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    pub version: Option<String>,
    /// Hardware acceleration methods (`cuda`, `vaapi`, `qsv`, ...).
    pub hwaccels: Vec<String>,
    /// Video decoder names (`h264`, `h264_cuvid`, ...).
    pub decoders: Vec<String>,
    /// Video encoder names (`libx264`, `h264_nvenc`, ...).
    pub encoders: Vec<String>,
    pub devices: Vec<GpuDevice>,
}

impl EngineCapabilities {
    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.iter().any(|e| e == name)
    }

    pub fn has_decoder(&self, name: &str) -> bool {
        self.decoders.iter().any(|d| d == name)
    }

    pub fn has_hwaccel(&self, name: &str) -> bool {
        self.hwaccels.iter().any(|h| h == name)
    }
}

/// Everything the engine needs to start one transcode pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Unique, filesystem-safe label (session id + generation).
    pub label: String,
    pub source: Url,
    pub proxy: Option<ProxyEndpoint>,
    /// Hardware acceleration method, `None` for a pure software decode.
    pub hwaccel: Option<String>,
    /// Explicit decoder, `None` to let the engine pick.
    pub decoder: Option<String>,
    pub encoder: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
}

/// A running pipeline that has produced its first output.
///
/// Dropping the box tears the pipeline down as well; `close` does it
/// gracefully and waits for the process to exit.
#[async_trait]
pub trait RunningPipeline: Send + Sync + fmt::Debug {
    /// Where a player picks the processed stream up (a playlist path or URL).
    fn output(&self) -> &str;

    async fn close(self: Box<Self>);
}

/// Something that can report capabilities and open pipelines.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    async fn capabilities(&self) -> Result<EngineCapabilities, Error>;

    /// Open a pipeline and resolve once it is first-frame-ready.
    ///
    /// Dropping the returned future cancels the open and releases
    /// everything it acquired.
    async fn open(&self, request: OpenRequest) -> Result<Box<dyn RunningPipeline>, OpenError>;

    /// Proxy schemes `open` can fetch a source through.
    fn proxy_schemes(&self) -> &'static [ProxyScheme] {
        &ProxyScheme::ALL
    }
}

// chanline-api: transcode engine, network prober, and proxy route checks

pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod probe;
pub mod route;
pub mod transport;

pub use engine::{EngineCapabilities, GpuDevice, OpenRequest, RunningPipeline, TranscodeEngine};
pub use error::{Error, OpenError};
pub use ffmpeg::{FfmpegEngine, FfmpegOptions};
pub use probe::{HttpProber, HttpProberConfig, Measurement, NetworkProber};
pub use route::{HttpRouteChecker, RouteChecker};
pub use transport::{ProxyEndpoint, ProxyScheme, TransportConfig};

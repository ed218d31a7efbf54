// Network measurement over plain HTTP.
//
// Latency, jitter and loss come from a burst of small HEAD requests;
// bandwidth from a bounded streaming download.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// One raw network measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub bandwidth_mbps: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    /// Fraction of lost probes, `0.0..=1.0`.
    pub packet_loss: f64,
}

/// Something that can take one network measurement.
#[async_trait]
pub trait NetworkProber: Send + Sync {
    async fn measure(&self) -> Result<Measurement, Error>;
}

#[derive(Debug, Clone)]
pub struct HttpProberConfig {
    /// Small endpoint hit with HEAD requests for RTT.
    pub latency_url: Url,
    /// Large resource streamed for throughput.
    pub download_url: Url,
    pub ping_count: u32,
    /// Stop the download after this many bytes.
    pub max_download_bytes: u64,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    config: HttpProberConfig,
}

impl HttpProber {
    pub fn new(config: HttpProberConfig) -> Result<Self, Error> {
        let client = config.transport.build_client()?;
        Ok(Self { client, config })
    }

    async fn ping(&self) -> Option<f64> {
        let start = Instant::now();
        match self
            .client
            .head(self.config.latency_url.clone())
            .send()
            .await
        {
            Ok(resp) if !resp.status().is_server_error() => {
                Some(start.elapsed().as_secs_f64() * 1000.0)
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "latency probe rejected");
                None
            }
            Err(e) => {
                debug!(error = %e, "latency probe failed");
                None
            }
        }
    }

    async fn throughput(&self) -> Result<f64, Error> {
        let start = Instant::now();
        let resp = self
            .client
            .get(self.config.download_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let mut stream = resp.bytes_stream();
        let mut total: u64 = 0;
        while let Some(chunk) = stream.next().await {
            total = total.saturating_add(u64::try_from(chunk?.len()).unwrap_or(u64::MAX));
            if total >= self.config.max_download_bytes {
                break;
            }
        }

        let secs = start.elapsed().max(Duration::from_micros(1)).as_secs_f64();
        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let bits = total as f64 * 8.0;
        Ok(bits / secs / 1_000_000.0)
    }
}

#[async_trait]
impl NetworkProber for HttpProber {
    async fn measure(&self) -> Result<Measurement, Error> {
        let attempts = self.config.ping_count.max(1);
        let mut rtts = Vec::with_capacity(usize::try_from(attempts).unwrap_or(0));
        for _ in 0..attempts {
            if let Some(rtt) = self.ping().await {
                rtts.push(rtt);
            }
        }

        if rtts.is_empty() {
            return Err(Error::Unreachable(self.config.latency_url.to_string()));
        }

        let lost = attempts - u32::try_from(rtts.len()).unwrap_or(attempts);
        let packet_loss = f64::from(lost) / f64::from(attempts);
        let (latency_ms, jitter_ms) = rtt_stats(&rtts);
        let bandwidth_mbps = self.throughput().await?;

        let measurement = Measurement {
            bandwidth_mbps,
            latency_ms,
            jitter_ms,
            packet_loss,
        };
        debug!(?measurement, "network measured");
        Ok(measurement)
    }
}

/// Mean RTT and jitter (mean absolute difference of consecutive RTTs).
pub fn rtt_stats(rtts: &[f64]) -> (f64, f64) {
    if rtts.is_empty() {
        return (0.0, 0.0);
    }
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;

    let diffs: Vec<f64> = rtts.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let jitter = if diffs.is_empty() {
        0.0
    } else {
        diffs.iter().sum::<f64>() / diffs.len() as f64
    };

    (mean, jitter)
}

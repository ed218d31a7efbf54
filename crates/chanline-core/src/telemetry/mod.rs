// ── Network telemetry ──
//
// Periodic measurement, classification, and fan-out of network readings.

mod monitor;
mod ring;

pub use monitor::{NetworkMonitor, classify};
pub use ring::RingBuffer;

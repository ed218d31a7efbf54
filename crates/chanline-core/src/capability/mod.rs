// ── Capability discovery ──
//
// Probes the transcode engine, publishes immutable snapshots, and meters
// concurrent hardware sessions.

mod budget;
mod prober;

pub use budget::{AccelerationBudget, AccelerationLease};
pub use prober::CapabilityProber;

// ── Adaptive quality control ──
//
// Per-session hysteresis over the shared telemetry stream. Downgrades are
// fast (a short streak of low samples); upgrades need sustained headroom
// measured on sample timestamps.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::AdaptationPolicy;
use crate::model::{NetworkReading, QualityClass, QualityTier};

/// A recommendation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    pub from: QualityTier,
    pub to: QualityTier,
}

#[derive(Debug, Clone)]
pub struct QualityController {
    policy: AdaptationPolicy,
    ceiling: QualityTier,
    tier: QualityTier,
    low_streak: u32,
    headroom_since: Option<DateTime<Utc>>,
}

impl QualityController {
    /// Start at the highest tier `initial` supports, bounded by `ceiling`.
    pub fn new(policy: AdaptationPolicy, ceiling: QualityTier, initial: QualityClass) -> Self {
        Self {
            policy,
            ceiling,
            tier: Self::initial_tier(initial, ceiling),
            low_streak: 0,
            headroom_since: None,
        }
    }

    pub fn initial_tier(class: QualityClass, ceiling: QualityTier) -> QualityTier {
        QualityTier::supported_by(class).min(ceiling)
    }

    /// Current recommendation.
    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn ceiling(&self) -> QualityTier {
        self.ceiling
    }

    /// Feed one reading. Returns a change only when the recommendation moves.
    pub fn observe(&mut self, reading: &NetworkReading) -> Option<TierChange> {
        let class = reading.class;

        if class < self.tier.required_class() {
            self.headroom_since = None;
            self.low_streak = self.low_streak.saturating_add(1);
            if self.low_streak < self.policy.downgrade_after.max(1) {
                return None;
            }
            self.low_streak = 0;
            let to = self.tier.down()?;
            return Some(self.move_to(to, reading));
        }
        self.low_streak = 0;

        let Some(next) = self.tier.up().filter(|next| *next <= self.ceiling) else {
            self.headroom_since = None;
            return None;
        };
        if class < next.required_class() {
            self.headroom_since = None;
            return None;
        }

        let at = reading.sample.timestamp;
        let since = *self.headroom_since.get_or_insert(at);
        let held = (at - since).to_std().unwrap_or_default();
        if held < self.policy.upgrade_dwell {
            return None;
        }
        Some(self.move_to(next, reading))
    }

    /// Pin the recommendation after an adaptation could not be applied.
    pub fn reset_to(&mut self, tier: QualityTier) {
        self.tier = tier.min(self.ceiling);
        self.low_streak = 0;
        self.headroom_since = None;
    }

    fn move_to(&mut self, to: QualityTier, reading: &NetworkReading) -> TierChange {
        let change = TierChange {
            from: self.tier,
            to,
        };
        self.tier = to;
        self.low_streak = 0;
        self.headroom_since = None;
        debug!(
            from = %change.from,
            to = %change.to,
            class = %reading.class,
            "quality recommendation changed"
        );
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    use crate::model::NetworkSample;

    fn reading(at: DateTime<Utc>, class: QualityClass) -> NetworkReading {
        NetworkReading {
            sample: NetworkSample {
                timestamp: at,
                ..NetworkSample::unmeasured(at)
            },
            class,
        }
    }

    fn controller(start: QualityClass) -> QualityController {
        QualityController::new(AdaptationPolicy::default(), QualityTier::Uhd4k, start)
    }

    #[test]
    fn initial_tier_respects_ceiling() {
        assert_eq!(
            QualityController::initial_tier(QualityClass::Excellent, QualityTier::Hd),
            QualityTier::Hd
        );
        assert_eq!(
            QualityController::initial_tier(QualityClass::Poor, QualityTier::Uhd4k),
            QualityTier::Sd
        );
    }

    #[test]
    fn two_poor_samples_at_fhd_step_down_to_hd() {
        let mut c = controller(QualityClass::Good);
        assert_eq!(c.tier(), QualityTier::Fhd);
        let t0 = Utc::now();

        assert_eq!(c.observe(&reading(t0, QualityClass::Poor)), None);
        let change = c.observe(&reading(t0 + TimeDelta::seconds(3), QualityClass::Poor));

        assert_eq!(
            change,
            Some(TierChange {
                from: QualityTier::Fhd,
                to: QualityTier::Hd
            })
        );
    }

    #[test]
    fn isolated_low_sample_does_not_downgrade() {
        let mut c = controller(QualityClass::Good);
        let t0 = Utc::now();

        assert_eq!(c.observe(&reading(t0, QualityClass::Fair)), None);
        assert_eq!(c.observe(&reading(t0 + TimeDelta::seconds(3), QualityClass::Good)), None);
        assert_eq!(c.observe(&reading(t0 + TimeDelta::seconds(6), QualityClass::Fair)), None);
        assert_eq!(c.tier(), QualityTier::Fhd);
    }

    #[test]
    fn sustained_headroom_upgrades_exactly_once() {
        let mut c = controller(QualityClass::Fair);
        assert_eq!(c.tier(), QualityTier::Hd);
        let t0 = Utc::now();

        let changes: Vec<TierChange> = (0..=15)
            .filter_map(|i| {
                c.observe(&reading(t0 + TimeDelta::seconds(i * 3), QualityClass::Excellent))
            })
            .collect();

        assert_eq!(
            changes,
            vec![TierChange {
                from: QualityTier::Hd,
                to: QualityTier::Fhd
            }]
        );
    }

    #[test]
    fn interrupted_headroom_restarts_dwell() {
        let mut c = controller(QualityClass::Fair);
        let t0 = Utc::now();

        assert_eq!(c.observe(&reading(t0, QualityClass::Good)), None);
        assert_eq!(c.observe(&reading(t0 + TimeDelta::seconds(20), QualityClass::Fair)), None);
        assert_eq!(c.observe(&reading(t0 + TimeDelta::seconds(31), QualityClass::Good)), None);
        assert_eq!(c.observe(&reading(t0 + TimeDelta::seconds(45), QualityClass::Good)), None);
        assert!(c.observe(&reading(t0 + TimeDelta::seconds(61), QualityClass::Good)).is_some());
    }

    #[test]
    fn ceiling_blocks_upgrades() {
        let mut c = QualityController::new(
            AdaptationPolicy::default(),
            QualityTier::Hd,
            QualityClass::Excellent,
        );
        let t0 = Utc::now();

        for i in 0..30 {
            assert_eq!(
                c.observe(&reading(t0 + TimeDelta::seconds(i * 3), QualityClass::Excellent)),
                None
            );
        }
        assert_eq!(c.tier(), QualityTier::Hd);
    }

    #[test]
    fn sd_never_downgrades() {
        let mut c = controller(QualityClass::Poor);
        let t0 = Utc::now();
        for i in 0..5 {
            assert_eq!(c.observe(&reading(t0 + TimeDelta::seconds(i), QualityClass::Poor)), None);
        }
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counts hardware pipelines in use against the device's session budget.
#[derive(Debug, Default)]
pub struct AccelerationBudget {
    in_use: AtomicU32,
}

impl AccelerationBudget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve one hardware slot if fewer than `limit` are taken.
    pub fn try_acquire(self: &Arc<Self>, limit: u32) -> Option<AccelerationLease> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()
            .map(|_| AccelerationLease {
                budget: Arc::clone(self),
            })
    }

    pub fn in_use(&self) -> u32 {
        self.in_use.load(Ordering::Acquire)
    }
}

/// One reserved hardware slot; released on drop.
#[derive(Debug)]
pub struct AccelerationLease {
    budget: Arc<AccelerationBudget>,
}

impl Drop for AccelerationLease {
    fn drop(&mut self) {
        self.budget.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leases_respect_limit_and_release_on_drop() {
        let budget = AccelerationBudget::new();
        let a = budget.try_acquire(2);
        let b = budget.try_acquire(2);
        assert!(a.is_some() && b.is_some());
        assert!(budget.try_acquire(2).is_none());
        assert_eq!(budget.in_use(), 2);

        drop(a);
        assert_eq!(budget.in_use(), 1);
        assert!(budget.try_acquire(2).is_some());
        assert_eq!(budget.in_use(), 1);
    }

    #[test]
    fn zero_limit_never_grants() {
        let budget = AccelerationBudget::new();
        assert!(budget.try_acquire(0).is_none());
    }
}

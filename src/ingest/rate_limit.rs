//! Upstream call budget gate.
//!
//! The budget is never decremented locally: every response reports how many
//! calls remain and the limiter re-reads that value. Once the value reaches
//! the floor the limiter halts for the rest of the run.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use metrics::counter;
use tracing::{debug, warn};

use crate::connectors::RateLimitInfo;

const UNKNOWN_REMAINING: i64 = -1;

/// Whether the caller may issue another upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Continue,
    Halt,
}

impl RateLimitDecision {
    pub fn is_halt(&self) -> bool {
        matches!(self, RateLimitDecision::Halt)
    }
}

/// Shared budget checkpoint consulted after every upstream call.
///
/// Safe to share between tasks behind an `Arc`; each caller re-checks after
/// its own call, so concurrent callers overshoot the floor by at most one
/// call each.
#[derive(Debug)]
pub struct RateLimiter {
    floor: u32,
    remaining: AtomicI64,
    halted: AtomicBool,
}

impl RateLimiter {
    pub fn new(floor: u32) -> Self {
        Self {
            floor,
            remaining: AtomicI64::new(UNKNOWN_REMAINING),
            halted: AtomicBool::new(false),
        }
    }

    /// Record the budget reported by the most recent call and decide whether to go on.
    pub fn check_remaining(&self, remaining: u32) -> RateLimitDecision {
        self.remaining.store(i64::from(remaining), Ordering::SeqCst);

        if remaining <= self.floor {
            self.trip(Some(remaining));
        }

        if self.is_halted() {
            RateLimitDecision::Halt
        } else {
            debug!(remaining, floor = self.floor, "Rate budget ok");
            RateLimitDecision::Continue
        }
    }

    /// Like [`check_remaining`](Self::check_remaining), for responses that may
    /// lack the header. A missing value keeps the last known decision.
    pub fn observe(&self, info: &RateLimitInfo) -> RateLimitDecision {
        match info.remaining {
            Some(remaining) => self.check_remaining(remaining),
            None if self.is_halted() => RateLimitDecision::Halt,
            None => RateLimitDecision::Continue,
        }
    }

    /// Halt without a reported value, e.g. when the provider rejected a call outright.
    pub fn halt(&self) {
        self.trip(None);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Last budget reported upstream, if any call reported one.
    pub fn remaining(&self) -> Option<u32> {
        u32::try_from(self.remaining.load(Ordering::SeqCst)).ok()
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    fn trip(&self, remaining: Option<u32>) {
        if self
            .halted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            warn!(
                remaining = ?remaining,
                floor = self.floor,
                "Upstream rate budget exhausted; no further calls this run"
            );
            counter!("activity_rate_limit_halts_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn continues_above_floor() {
        let limiter = RateLimiter::new(10);
        assert_eq!(limiter.check_remaining(11), RateLimitDecision::Continue);
        assert_eq!(limiter.remaining(), Some(11));
        assert!(!limiter.is_halted());
    }

    #[test]
    fn halts_at_floor_and_stays_halted() {
        let limiter = RateLimiter::new(10);
        assert_eq!(limiter.check_remaining(10), RateLimitDecision::Halt);

        // A later, higher reading does not resume the run
        assert_eq!(limiter.check_remaining(4000), RateLimitDecision::Halt);
        assert!(limiter.is_halted());
        assert_eq!(limiter.remaining(), Some(4000));
    }

    #[test]
    fn missing_header_keeps_last_decision() {
        let limiter = RateLimiter::new(5);
        assert_eq!(limiter.remaining(), None);
        assert_eq!(
            limiter.observe(&RateLimitInfo::default()),
            RateLimitDecision::Continue
        );

        limiter.halt();
        assert_eq!(
            limiter.observe(&RateLimitInfo::default()),
            RateLimitDecision::Halt
        );
    }

    #[test]
    fn zero_floor_only_halts_on_empty_budget() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.check_remaining(1), RateLimitDecision::Continue);
        assert_eq!(limiter.check_remaining(0), RateLimitDecision::Halt);
    }

    #[tokio::test]
    async fn shared_between_tasks() {
        let limiter = Arc::new(RateLimiter::new(10));

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_remaining(100 - i * 30) })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        // 100 - 3 * 30 = 10 hit the floor in one of the tasks
        assert!(limiter.is_halted());
    }
}

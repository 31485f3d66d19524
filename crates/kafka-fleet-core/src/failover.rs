use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-broker restart backoff state.
///
/// Delays double on every consecutive failure up to `max_delay_ms`; observing
/// a running task resets the counter. When `max_tries` is set and reached,
/// the owning broker is deactivated by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failover {
    pub failures: u32,
    pub max_tries: Option<u32>,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub failure_time: Option<DateTime<Utc>>,
}

impl Failover {
    pub fn new(delay_ms: u64, max_delay_ms: u64, max_tries: Option<u32>) -> Self {
        Failover {
            failures: 0,
            max_tries,
            delay_ms,
            max_delay_ms,
            failure_time: None,
        }
    }

    /// Record one failure at the given instant
    pub fn register_failure(&mut self, now: DateTime<Utc>) {
        self.failures += 1;
        self.failure_time = Some(now);
    }

    /// Forget accumulated failures
    pub fn reset_failures(&mut self) {
        self.failures = 0;
        self.failure_time = None;
    }

    /// `min(delay * 2^(failures - 1), max_delay)`, zero while unfailed.
    /// The shift saturates so large counters cannot overflow.
    pub fn current_delay(&self) -> Duration {
        if self.failures == 0 {
            return Duration::zero();
        }
        let factor = 1u64.checked_shl(self.failures - 1).unwrap_or(u64::MAX);
        let ms = self
            .delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::milliseconds(ms as i64)
    }

    /// Instant the current backoff window closes, if one is open
    pub fn delay_expires(&self) -> Option<DateTime<Utc>> {
        self.failure_time.map(|t| t + self.current_delay())
    }

    /// True while launches must be withheld
    pub fn is_waiting_delay(&self, now: DateTime<Utc>) -> bool {
        match self.delay_expires() {
            Some(expires) => now < expires,
            None => false,
        }
    }

    pub fn is_max_tries_exceeded(&self) -> bool {
        match self.max_tries {
            Some(max) => self.failures >= max,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut failover = Failover::new(10_000, 60_000, None);
        assert_eq!(failover.current_delay(), Duration::zero());

        failover.register_failure(at(0));
        assert_eq!(failover.current_delay(), Duration::seconds(10));

        failover.register_failure(at(20));
        assert_eq!(failover.current_delay(), Duration::seconds(20));

        failover.register_failure(at(50));
        assert_eq!(failover.current_delay(), Duration::seconds(40));

        failover.register_failure(at(100));
        assert_eq!(failover.current_delay(), Duration::seconds(60)); // capped
    }

    #[test]
    fn test_waiting_window() {
        let mut failover = Failover::new(10_000, 60_000, Some(3));

        assert!(!failover.is_waiting_delay(at(0)));

        failover.register_failure(at(0));
        assert_eq!(failover.delay_expires(), Some(at(10)));
        assert!(failover.is_waiting_delay(at(5)));
        assert!(!failover.is_waiting_delay(at(10)));
        assert!(!failover.is_waiting_delay(at(11)));
    }

    #[test]
    fn test_reset_clears_window() {
        let mut failover = Failover::new(10_000, 60_000, Some(3));
        failover.register_failure(at(0));
        failover.register_failure(at(1));

        failover.reset_failures();
        assert_eq!(failover.failures, 0);
        assert_eq!(failover.failure_time, None);
        assert!(!failover.is_waiting_delay(at(2)));
        assert_eq!(failover.current_delay(), Duration::zero());
    }

    #[test]
    fn test_max_tries_gate() {
        let mut failover = Failover::new(1_000, 60_000, Some(3));
        failover.register_failure(at(0));
        failover.register_failure(at(1));
        assert!(!failover.is_max_tries_exceeded());

        failover.register_failure(at(2));
        assert!(failover.is_max_tries_exceeded());

        let mut unlimited = Failover::new(1_000, 60_000, None);
        for i in 0..100 {
            unlimited.register_failure(at(i));
        }
        assert!(!unlimited.is_max_tries_exceeded());
    }

    #[test]
    fn test_huge_failure_count_does_not_overflow() {
        let mut failover = Failover::new(10_000, 3_600_000, None);
        failover.failures = 500;
        failover.failure_time = Some(at(0));
        assert_eq!(failover.current_delay(), Duration::milliseconds(3_600_000));
    }

    proptest! {
        #[test]
        fn prop_delay_is_monotonic_and_bounded(
            delay_ms in 1u64..100_000,
            max_delay_ms in 1u64..10_000_000,
            steps in 1u32..64,
        ) {
            let mut failover = Failover::new(delay_ms, max_delay_ms, None);
            let mut last = Duration::zero();
            for i in 0..steps {
                failover.register_failure(at(i as i64));
                let current = failover.current_delay();
                prop_assert!(current >= last);
                prop_assert!(current <= Duration::milliseconds(max_delay_ms as i64));
                last = current;
            }
        }
    }
}

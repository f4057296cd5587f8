use rand::Rng;
use std::time::Duration;

/// Jittered exponential backoff: doubles per consecutive failure up to a
/// cap, resets to the base on success. Used by the document sweep loop;
/// polling clients apply the same policy to their request timers.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.current_delay()
    }

    /// Base × 2^failures, capped, with up to 10% additive jitter so
    /// independent clients do not synchronize their retries.
    pub fn current_delay(&self) -> Duration {
        let exp = self.consecutive_failures.saturating_sub(1).min(16);
        let unjittered = self
            .base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.cap);
        let jitter_ceiling = (unjittered.as_millis() as u64 / 10).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
        (unjittered + Duration::from_millis(jitter)).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        let first = backoff.record_failure();
        assert!(first >= Duration::from_secs(10) && first <= Duration::from_secs(11));
        let second = backoff.record_failure();
        assert!(second >= Duration::from_secs(20) && second <= Duration::from_secs(22));
        for _ in 0..10 {
            backoff.record_failure();
        }
        assert!(backoff.current_delay() <= Duration::from_secs(60));
    }

    #[test]
    fn test_success_resets_to_base() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        backoff.record_failure();
        backoff.record_failure();
        backoff.record_failure();
        backoff.record_success();
        let next = backoff.record_failure();
        assert!(next >= Duration::from_secs(10) && next <= Duration::from_secs(11));
    }

    #[test]
    fn test_no_overflow_under_sustained_failure() {
        let mut backoff = Backoff::new(Duration::from_secs(12), Duration::from_secs(60));
        for _ in 0..1_000 {
            let d = backoff.record_failure();
            assert!(d <= Duration::from_secs(60));
        }
    }
}

//! Token bucket implementation.

use tokio::time::Instant;

/// Refill rate and capacity shared by every bucket a registry creates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    /// Tokens added per second
    pub rate: f64,
    /// Maximum number of tokens held at once
    pub burst: u32,
}

impl Quota {
    /// Create a new quota.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self { rate, burst }
    }
}

impl Default for Quota {
    /// Two requests per second with a burst of four.
    fn default() -> Self {
        Self::new(2.0, 4)
    }
}

/// Classic token-bucket limiter for a single client.
///
/// Tokens are added at `rate` per second up to `capacity`, and each
/// admitted request consumes one. The bucket starts full. It is not
/// synchronized; the registry hands it out behind a mutex.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new bucket starting at full capacity.
    pub fn new(quota: Quota) -> Self {
        Self::with_instant(quota, Instant::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    pub fn with_instant(quota: Quota, now: Instant) -> Self {
        let capacity = f64::from(quota.burst);
        Self {
            capacity,
            rate: quota.rate,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill tokens based on time elapsed since the last refill.
    ///
    /// An instant earlier than the last refill adds nothing.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Take one token if available.
    ///
    /// Returns `true` if the request is admitted.
    pub fn allow(&mut self) -> bool {
        self.try_acquire(Instant::now())
    }

    /// Refill up to `now`, then try to consume one token.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token count after refilling up to `now`.
    #[cfg(test)]
    pub(crate) fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_quota() {
        let quota = Quota::default();
        assert_eq!(quota.rate, 2.0);
        assert_eq!(quota.burst, 4);
    }

    #[test]
    fn test_burst_then_reject() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_instant(Quota::default(), start);

        for i in 0..4 {
            assert!(bucket.try_acquire(start), "request {} should be admitted", i + 1);
        }

        // The 5th request should be rejected
        assert!(!bucket.try_acquire(start));
    }

    #[test]
    fn test_refill_after_half_second() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_instant(Quota::default(), start);

        for _ in 0..4 {
            bucket.try_acquire(start);
        }
        assert!(!bucket.try_acquire(start));

        let later = start + Duration::from_millis(500);
        assert!(bucket.try_acquire(later));
        assert!(!bucket.try_acquire(later));
    }

    #[test]
    fn test_refill_is_capped_at_burst() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_instant(Quota::default(), start);
        bucket.try_acquire(start);

        let much_later = start + Duration::from_secs(60);
        assert_eq!(bucket.available(much_later), 4.0);

        for _ in 0..4 {
            assert!(bucket.try_acquire(much_later));
        }
        assert!(!bucket.try_acquire(much_later));
    }

    #[test]
    fn test_rejection_keeps_partial_refill() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_instant(Quota::default(), start);
        for _ in 0..4 {
            bucket.try_acquire(start);
        }

        // A quarter second buys half a token; not enough, but it is kept.
        let quarter = start + Duration::from_millis(250);
        assert!(!bucket.try_acquire(quarter));
        assert_eq!(bucket.available(quarter), 0.5);

        assert!(bucket.try_acquire(start + Duration::from_millis(500)));
    }

    #[test]
    fn test_clock_going_backwards_adds_nothing() {
        let start = Instant::now() + Duration::from_secs(10);
        let mut bucket = TokenBucket::with_instant(Quota::new(1.0, 1), start);

        assert!(bucket.try_acquire(start));
        assert!(!bucket.try_acquire(start - Duration::from_secs(5)));
        assert_eq!(bucket.available(start), 0.0);
    }

    #[test]
    fn test_quota_sets_capacity_and_rate() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_instant(Quota::new(10.0, 20), start);
        assert_eq!(bucket.available(start), 20.0);

        for _ in 0..20 {
            assert!(bucket.try_acquire(start));
        }
        assert!(!bucket.try_acquire(start));
        assert!(bucket.try_acquire(start + Duration::from_millis(100)));
    }
}

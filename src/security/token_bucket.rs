//! Token bucket primitive.
//!
//! A bucket holds a real-valued token count that refills continuously at a
//! fixed rate up to its capacity. Callers pass the current instant so the
//! refill arithmetic can be exercised deterministically.

use std::time::Instant;

/// A single identity's request quota.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket with an explicit capacity and refill rate
    /// (tokens per second).
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Create a full bucket from a requests-per-minute limit.
    pub fn per_minute(limit: u32, now: Instant) -> Self {
        let limit = f64::from(limit);
        Self::new(limit, limit / 60.0, now)
    }

    /// Refill for the time elapsed since the last call, then take one token
    /// if at least one is available.
    ///
    /// A denied call still advances the refill clock; the count never drops
    /// below zero.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whether the bucket would be back at capacity at `now`. Only a full
    /// bucket is interchangeable with a freshly created one.
    pub fn is_full_at(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens + elapsed * self.refill_rate >= self.capacity
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_burst_is_capped_at_capacity() {
        let now = Instant::now();
        let mut bucket = TokenBucket::per_minute(5, now);

        let allowed = (0..12).filter(|_| bucket.try_consume(now)).count();
        assert_eq!(allowed, 5);
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_refill_after_drain() {
        let start = Instant::now();
        // 60/min refills exactly one token per second.
        let mut bucket = TokenBucket::per_minute(60, start);
        while bucket.try_consume(start) {}

        let later = start + Duration::from_secs(5);
        let allowed = (0..20).filter(|_| bucket.try_consume(later)).count();
        assert_eq!(allowed, 5);
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::per_minute(3, start);
        while bucket.try_consume(start) {}

        let much_later = start + Duration::from_secs(3600);
        let allowed = (0..10).filter(|_| bucket.try_consume(much_later)).count();
        assert_eq!(allowed, 3);
    }

    #[test]
    fn test_denied_call_still_refills() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 0.5, start);
        assert!(bucket.try_consume(start));

        let t1 = start + Duration::from_secs(1);
        assert!(!bucket.try_consume(t1));
        assert_eq!(bucket.tokens(), 0.5);
        assert_eq!(bucket.last_refill(), t1);

        assert!(bucket.try_consume(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_is_full_only_after_complete_refill() {
        let start = Instant::now();
        let mut bucket = TokenBucket::per_minute(60, start);
        assert!(bucket.is_full_at(start));
        while bucket.try_consume(start) {}

        assert!(!bucket.is_full_at(start + Duration::from_secs(30)));
        assert!(bucket.is_full_at(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_clock_going_backwards_is_ignored() {
        let start = Instant::now();
        let later = start + Duration::from_secs(10);
        let mut bucket = TokenBucket::per_minute(1, later);
        assert!(bucket.try_consume(later));
        assert!(!bucket.try_consume(start));
        assert_eq!(bucket.last_refill(), later);
    }
}

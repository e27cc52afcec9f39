//! Per-identity rate limiting.
//!
//! Two independent maps (client IP and API key) hold one token bucket per
//! identity. Buckets are created lazily through the map's entry API so two
//! concurrent first requests share a single bucket. Each bucket sits behind
//! its own mutex; the map shard lock is released before the bucket is
//! touched, so different identities never contend on refill/consume.

use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::security::token_bucket::TokenBucket;

type SharedBucket = Arc<Mutex<TokenBucket>>;

/// Which quota rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Ip,
    ApiKey,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Ip => "ip",
            LimitScope::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token-bucket rate limiter keyed by client IP and API key.
#[derive(Debug, Default)]
pub struct RateLimiter {
    by_ip: DashMap<String, SharedBucket>,
    by_key: DashMap<String, SharedBucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the request may proceed.
    pub fn allow(&self, ip: &str, api_key: &str, ip_limit: u32, key_limit: u32) -> bool {
        self.check_at(ip, api_key, ip_limit, key_limit, Instant::now())
            .is_ok()
    }

    /// Like [`RateLimiter::allow`], at an explicit instant.
    pub fn allow_at(
        &self,
        ip: &str,
        api_key: &str,
        ip_limit: u32,
        key_limit: u32,
        now: Instant,
    ) -> bool {
        self.check_at(ip, api_key, ip_limit, key_limit, now).is_ok()
    }

    /// Charge the IP bucket, then the key bucket if a key is present.
    ///
    /// A denial from the IP bucket short-circuits: the key bucket is not
    /// charged. The error names the quota that was exhausted.
    pub fn check_at(
        &self,
        ip: &str,
        api_key: &str,
        ip_limit: u32,
        key_limit: u32,
        now: Instant,
    ) -> Result<(), LimitScope> {
        if !consume(&self.by_ip, ip, ip_limit, now) {
            return Err(LimitScope::Ip);
        }

        if !api_key.is_empty() && !consume(&self.by_key, api_key, key_limit, now) {
            return Err(LimitScope::ApiKey);
        }

        Ok(())
    }

    /// Drop buckets that have not been touched for `max_idle` and have
    /// refilled to capacity.
    ///
    /// A partially drained bucket is kept however long it has been idle, so
    /// a returning identity never gets more than its refill allows. A bucket
    /// currently held by an in-flight check is kept too, so an identity never
    /// ends up with two live buckets. Returns the number removed.
    pub fn evict_idle(&self, max_idle: Duration, now: Instant) -> usize {
        evict(&self.by_ip, max_idle, now) + evict(&self.by_key, max_idle, now)
    }

    /// Number of tracked identities, IPs and keys together.
    pub fn tracked_identities(&self) -> usize {
        self.by_ip.len() + self.by_key.len()
    }
}

fn consume(map: &DashMap<String, SharedBucket>, identity: &str, limit: u32, now: Instant) -> bool {
    let bucket = bucket_for(map, identity, limit, now);
    let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
    bucket.try_consume(now)
}

fn bucket_for(
    map: &DashMap<String, SharedBucket>,
    identity: &str,
    limit: u32,
    now: Instant,
) -> SharedBucket {
    if let Some(existing) = map.get(identity) {
        return existing.value().clone();
    }

    // The entry holds the shard write lock, so a racing creator observes
    // and reuses whichever bucket got inserted first.
    map.entry(identity.to_owned())
        .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::per_minute(limit, now))))
        .value()
        .clone()
}

fn evict(map: &DashMap<String, SharedBucket>, max_idle: Duration, now: Instant) -> usize {
    let before = map.len();
    map.retain(|_, bucket| {
        if Arc::strong_count(bucket) > 1 {
            return true;
        }
        let guard = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(guard.last_refill()) < max_idle || !guard.is_full_at(now)
    });
    before.saturating_sub(map.len())
}

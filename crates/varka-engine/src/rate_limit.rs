//! Admission control for script execution
//!
//! Two independent devices, both consulted per (scope, script):
//!
//! - a fixed-interval cooldown since the last admission of that script;
//! - a token bucket keyed by scope only, shared across the scope's scripts,
//!   refilled continuously in proportion to elapsed time and capped at the
//!   burst limit.
//!
//! A successful admission stamps the cooldown and debits the bucket in the
//! same call, before the dispatched action tree has finished, so concurrent
//! runs of one script cannot double-admit.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use varka_core::ScopeId;

use crate::config::EngineConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Cooldown plus token-bucket admission control
pub struct RateLimiter {
    cooldown: Duration,
    burst_limit: f64,
    refill_per_sec: f64,
    cooldowns: DashMap<(ScopeId, String), Instant>,
    buckets: DashMap<ScopeId, Bucket>,
}

impl RateLimiter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            burst_limit: f64::from(config.burst_limit),
            refill_per_sec: config.refill_per_sec,
            cooldowns: DashMap::new(),
            buckets: DashMap::new(),
        }
    }

    /// Admit or reject one (scope, script) execution
    pub fn try_admit(&self, scope: &ScopeId, script_id: &str) -> bool {
        self.admit_at(scope, script_id, Instant::now())
    }

    fn admit_at(&self, scope: &ScopeId, script_id: &str, now: Instant) -> bool {
        let key = (scope.clone(), script_id.to_string());
        if let Some(last) = self.cooldowns.get(&key) {
            if now.duration_since(*last) < self.cooldown {
                return false;
            }
        }

        let mut bucket = self.buckets.entry(scope.clone()).or_insert_with(|| Bucket {
            tokens: self.burst_limit,
            last_refill: now,
        });
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.burst_limit);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            drop(bucket);
            self.cooldowns.insert(key, now);
            true
        } else {
            warn!(scope = %scope, tokens = format!("{:.2}", bucket.tokens),
                "Rate limit hit");
            false
        }
    }

    /// Drop cooldown stamps older than the horizon; returns how many
    pub fn prune_cooldowns(&self, horizon: Duration) -> usize {
        let now = Instant::now();
        let before = self.cooldowns.len();
        self.cooldowns
            .retain(|_, stamp| now.duration_since(*stamp) < horizon);
        let pruned = before - self.cooldowns.len();
        if pruned > 0 {
            info!(pruned, "Pruned stale cooldowns");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(cooldown_secs: f64, burst: u32, refill: f64) -> RateLimiter {
        RateLimiter::new(&EngineConfig {
            cooldown_secs,
            burst_limit: burst,
            refill_per_sec: refill,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_cooldown_blocks_rapid_same_script() {
        let limiter = limiter(0.5, 20, 1.0);
        let scope = ScopeId::from("guild-1");
        let start = Instant::now();

        assert!(limiter.admit_at(&scope, "greet", start));
        assert!(!limiter.admit_at(&scope, "greet", start + Duration::from_millis(100)));
        assert!(limiter.admit_at(&scope, "greet", start + Duration::from_millis(600)));
    }

    #[test]
    fn test_bucket_full_admits_burst_then_rejects() {
        let limiter = limiter(0.0, 3, 1.0);
        let scope = ScopeId::from("guild-1");
        let start = Instant::now();

        // distinct scripts so only the shared bucket applies
        assert!(limiter.admit_at(&scope, "a", start));
        assert!(limiter.admit_at(&scope, "b", start));
        assert!(limiter.admit_at(&scope, "c", start));
        assert!(!limiter.admit_at(&scope, "d", start));

        // exactly one token refills after one token's worth of time
        let later = start + Duration::from_secs(1);
        assert!(limiter.admit_at(&scope, "d", later));
        assert!(!limiter.admit_at(&scope, "e", later));
    }

    #[test]
    fn test_buckets_are_per_scope() {
        let limiter = limiter(0.0, 1, 1.0);
        let start = Instant::now();

        assert!(limiter.admit_at(&ScopeId::from("guild-1"), "a", start));
        assert!(limiter.admit_at(&ScopeId::from("guild-2"), "a", start));
        assert!(!limiter.admit_at(&ScopeId::from("guild-1"), "b", start));
    }

    #[test]
    fn test_admission_debits_once() {
        let limiter = limiter(0.0, 2, 0.0);
        let scope = ScopeId::from("guild-1");
        let start = Instant::now();

        assert!(limiter.admit_at(&scope, "a", start));
        assert!(limiter.admit_at(&scope, "b", start));
        // two admissions spent exactly two tokens
        assert!(!limiter.admit_at(&scope, "c", start));
    }

    #[test]
    fn test_prune_cooldowns() {
        let limiter = limiter(0.5, 20, 1.0);
        let scope = ScopeId::from("guild-1");
        assert!(limiter.try_admit(&scope, "greet"));

        assert_eq!(limiter.prune_cooldowns(Duration::from_secs(3600)), 0);
        assert_eq!(limiter.prune_cooldowns(Duration::from_secs(0)), 1);
    }
}

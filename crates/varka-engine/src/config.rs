//! Engine configuration
//!
//! All knobs the embedder can turn, with defaults matching the original
//! runtime's constants. Deserializable so embedders can load it from their
//! own config files; every field falls back to its default when missing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use varka_core::Limits;

/// Tunable engine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum seconds between admissions of the same script
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    /// Token bucket capacity per scope
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,

    /// Token bucket refill rate, tokens per second
    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: f64,

    /// Delay between consecutive literal statements of one run
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Execution recursion depth cap
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,

    /// Scripts allowed to trigger per event; later matches still run their
    /// initialization but are not dispatched
    #[serde(default = "default_max_triggers_per_event")]
    pub max_triggers_per_event: usize,

    /// Bound on concurrently in-flight action trees
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Cooldown entries older than this are dropped by `prune_cooldowns`
    #[serde(default = "default_cooldown_horizon_secs")]
    pub cooldown_horizon_secs: u64,

    /// Structural script limits
    #[serde(default)]
    pub limits: Limits,
}

fn default_cooldown_secs() -> f64 {
    0.5
}

fn default_burst_limit() -> u32 {
    20
}

fn default_refill_per_sec() -> f64 {
    1.0
}

fn default_pacing_delay_ms() -> u64 {
    250
}

fn default_max_recursion_depth() -> usize {
    10
}

fn default_max_triggers_per_event() -> usize {
    20
}

fn default_max_in_flight() -> usize {
    64
}

fn default_cooldown_horizon_secs() -> u64 {
    3600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            burst_limit: default_burst_limit(),
            refill_per_sec: default_refill_per_sec(),
            pacing_delay_ms: default_pacing_delay_ms(),
            max_recursion_depth: default_max_recursion_depth(),
            max_triggers_per_event: default_max_triggers_per_event(),
            max_in_flight: default_max_in_flight(),
            cooldown_horizon_secs: default_cooldown_horizon_secs(),
            limits: Limits::default(),
        }
    }
}

impl EngineConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn cooldown_horizon(&self) -> Duration {
        Duration::from_secs(self.cooldown_horizon_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cooldown_secs, 0.5);
        assert_eq!(config.burst_limit, 20);
        assert_eq!(config.pacing_delay_ms, 250);
        assert_eq!(config.limits.max_scripts, 100);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"burst_limit": 5}"#).unwrap();
        assert_eq!(config.burst_limit, 5);
        assert_eq!(config.max_recursion_depth, 10);
        assert_eq!(config.limits.max_actions, 50);
    }
}

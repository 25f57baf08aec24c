//! Per-site fault tables.
//!
//! A site is one decision point inside a handler. Its rules are ordered and
//! each rule owns a `share` of the global error rate. A decision takes a
//! single uniform draw in `[0, 100)` and walks the rules with cumulative
//! thresholds, so `P(rule) = rate * share / 100` for every rule.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::condition::{CrashKind, ResourceKind, SecurityKind, SimulatedCondition, ValidationKind};

/// Site names consulted by the built-in endpoints.
pub mod sites {
    pub const HEALTH: &str = "health";
    pub const FAST: &str = "fast";
    pub const SLOW: &str = "slow";
    pub const MEMORY_INTENSIVE: &str = "memory-intensive";
    pub const CPU_INTENSIVE: &str = "cpu-intensive";
    pub const DATABASE: &str = "database-simulation";
    pub const CHAIN_CALLS: &str = "chain-calls";
    pub const EXTERNAL_CALL: &str = "external-call";
}

/// One weighted entry in a site table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRule {
    /// Fraction of the global error rate this rule occupies, in (0, 1].
    pub share: f64,

    #[serde(flatten)]
    pub effect: FaultEffect,
}

/// What a rule produces when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum FaultEffect {
    LatencySpike { min_ms: u64, max_ms: u64 },
    Timeout { after_ms: u64 },
    Validation {
        #[serde(default)]
        kinds: Vec<ValidationKind>,
    },
    Resource {
        #[serde(default)]
        kinds: Vec<ResourceKind>,
    },
    Security {
        #[serde(default)]
        kinds: Vec<SecurityKind>,
    },
    Crash {
        #[serde(default)]
        kinds: Vec<CrashKind>,
    },
    Unavailable,
}

impl FaultRule {
    pub fn new(share: f64, effect: FaultEffect) -> Self {
        Self { share, effect }
    }
}

impl FaultEffect {
    /// Draw the concrete condition for this effect. An empty kind list means
    /// any kind of that family.
    pub fn realize<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulatedCondition {
        match self {
            FaultEffect::LatencySpike { min_ms, max_ms } => {
                SimulatedCondition::LatencySpike(uniform_duration(rng, *min_ms, *max_ms))
            }
            FaultEffect::Timeout { after_ms } => {
                SimulatedCondition::Timeout(Duration::from_millis(*after_ms))
            }
            FaultEffect::Validation { kinds } => {
                SimulatedCondition::ValidationError(choose(rng, kinds, ValidationKind::ALL))
            }
            FaultEffect::Resource { kinds } => {
                SimulatedCondition::ResourceError(choose(rng, kinds, ResourceKind::ALL))
            }
            FaultEffect::Security { kinds } => {
                SimulatedCondition::SecurityError(choose(rng, kinds, SecurityKind::ALL))
            }
            FaultEffect::Crash { kinds } => {
                SimulatedCondition::CrashError(choose(rng, kinds, CrashKind::ALL))
            }
            FaultEffect::Unavailable => SimulatedCondition::Unavailable,
        }
    }
}

fn choose<R: Rng + ?Sized, T: Copy>(rng: &mut R, configured: &[T], all: &[T]) -> T {
    let pool = if configured.is_empty() { all } else { configured };
    pool[rng.gen_range(0..pool.len())]
}

/// Uniform duration in `[min_ms, max_ms]`; tolerates an inverted range.
pub fn uniform_duration<R: Rng + ?Sized>(rng: &mut R, min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms { (min_ms, max_ms) } else { (max_ms, min_ms) };
    Duration::from_millis(rng.gen_range(lo..=hi))
}

/// Evaluate one site table against the current error rate.
///
/// Pure apart from the supplied random source, so tests can drive it with a
/// seeded generator.
pub fn evaluate<R: Rng + ?Sized>(
    rules: &[FaultRule],
    error_rate_percent: f64,
    rng: &mut R,
) -> SimulatedCondition {
    if rules.is_empty() {
        return SimulatedCondition::None;
    }

    let draw: f64 = rng.gen_range(0.0..100.0);
    let mut threshold = 0.0;
    for rule in rules {
        threshold += error_rate_percent * rule.share;
        if draw < threshold {
            return rule.effect.realize(rng);
        }
    }
    SimulatedCondition::None
}

/// All site tables known to the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultProfile {
    sites: BTreeMap<String, Vec<FaultRule>>,
}

impl FaultProfile {
    pub fn empty() -> Self {
        Self { sites: BTreeMap::new() }
    }

    /// Tables used when no configuration overrides them.
    pub fn builtin() -> Self {
        const THIRD: f64 = 1.0 / 3.0;
        let mut profile = Self::empty();

        profile.insert(sites::HEALTH, vec![FaultRule::new(0.2, FaultEffect::Unavailable)]);
        profile.insert(
            sites::FAST,
            vec![FaultRule::new(0.5, FaultEffect::Validation { kinds: Vec::new() })],
        );
        profile.insert(
            sites::SLOW,
            vec![
                FaultRule::new(THIRD, FaultEffect::LatencySpike { min_ms: 2_000, max_ms: 4_000 }),
                FaultRule::new(THIRD, FaultEffect::Timeout { after_ms: 5_000 }),
            ],
        );
        profile.insert(
            sites::MEMORY_INTENSIVE,
            vec![
                FaultRule::new(
                    2.0 * THIRD,
                    FaultEffect::Resource { kinds: vec![ResourceKind::MemoryPressure] },
                ),
                FaultRule::new(
                    THIRD,
                    FaultEffect::Resource { kinds: vec![ResourceKind::MemoryExhausted] },
                ),
            ],
        );
        profile.insert(
            sites::CPU_INTENSIVE,
            vec![
                FaultRule::new(THIRD, FaultEffect::Timeout { after_ms: 3_000 }),
                FaultRule::new(THIRD, FaultEffect::Crash { kinds: Vec::new() }),
            ],
        );
        profile.insert(
            sites::DATABASE,
            vec![
                FaultRule::new(THIRD, FaultEffect::LatencySpike { min_ms: 1_000, max_ms: 3_000 }),
                FaultRule::new(
                    THIRD,
                    FaultEffect::Resource { kinds: vec![ResourceKind::ConnectionPoolExhausted] },
                ),
                FaultRule::new(THIRD, FaultEffect::Crash { kinds: Vec::new() }),
            ],
        );
        profile.insert(
            sites::CHAIN_CALLS,
            vec![
                FaultRule::new(0.5, FaultEffect::Unavailable),
                FaultRule::new(0.25, FaultEffect::Crash { kinds: Vec::new() }),
            ],
        );
        profile.insert(
            sites::EXTERNAL_CALL,
            vec![
                FaultRule::new(THIRD, FaultEffect::Timeout { after_ms: 10_000 }),
                FaultRule::new(THIRD, FaultEffect::Unavailable),
            ],
        );

        profile
    }

    pub fn insert(&mut self, site: impl Into<String>, rules: Vec<FaultRule>) {
        self.sites.insert(site.into(), rules);
    }

    /// Replace whole site tables with the ones in `overrides`.
    pub fn merged(mut self, overrides: &BTreeMap<String, Vec<FaultRule>>) -> Self {
        for (site, rules) in overrides {
            self.sites.insert(site.clone(), rules.clone());
        }
        self
    }

    pub fn rules(&self, site: &str) -> Option<&[FaultRule]> {
        self.sites.get(site).map(Vec::as_slice)
    }

    pub fn sites(&self) -> impl Iterator<Item = (&str, &[FaultRule])> {
        self.sites.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Default for FaultProfile {
    fn default() -> Self {
        Self::builtin()
    }
}

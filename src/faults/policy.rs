//! Process-wide fault policy.
//!
//! The error rate is a single `f64` stored as raw bits in an `AtomicU64`, so
//! every read and write is one atomic operation and readers can never see a
//! partially written value. Site tables live behind an `ArcSwap` and are
//! replaced wholesale on config reload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::condition::SimulatedCondition;
use super::profile::{evaluate, uniform_duration, FaultProfile};

/// Errors raised by policy mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// Error rate outside `[0, 100]` or not a finite number.
    #[error("error rate {value} is outside the accepted range [0, 100]")]
    InvalidParameter { value: f64 },
}

/// Shared, concurrently accessed fault-injection state.
pub struct FaultPolicy {
    error_rate_bits: AtomicU64,
    profile: ArcSwap<FaultProfile>,
    rng: Mutex<StdRng>,
}

impl FaultPolicy {
    /// Rate the process starts with unless configured otherwise.
    pub const DEFAULT_ERROR_RATE: f64 = 3.0;

    /// Create a policy. A `seed` makes every draw reproducible.
    pub fn new(
        initial_rate: f64,
        profile: FaultProfile,
        seed: Option<u64>,
    ) -> Result<Self, PolicyError> {
        check_rate(initial_rate)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            error_rate_bits: AtomicU64::new(initial_rate.to_bits()),
            profile: ArcSwap::from_pointee(profile),
            rng: Mutex::new(rng),
        })
    }

    /// Current global error rate, in percent.
    pub fn error_rate(&self) -> f64 {
        f64::from_bits(self.error_rate_bits.load(Ordering::SeqCst))
    }

    /// Replace the global error rate and return the previous value.
    ///
    /// Rejected values leave the stored rate untouched.
    pub fn set_error_rate(&self, value: f64) -> Result<f64, PolicyError> {
        check_rate(value)?;
        let previous = self.error_rate_bits.swap(value.to_bits(), Ordering::SeqCst);
        Ok(f64::from_bits(previous))
    }

    /// Decide which condition applies at `site`, using the policy's generator.
    pub fn decide(&self, site: &str) -> SimulatedCondition {
        self.with_rng(|rng| self.decide_with(site, rng))
    }

    /// Decide with a caller-supplied random source. Unknown sites never fault.
    pub fn decide_with<R: Rng + ?Sized>(&self, site: &str, rng: &mut R) -> SimulatedCondition {
        let rate = self.error_rate();
        let profile = self.profile.load();
        match profile.rules(site) {
            Some(rules) => evaluate(rules, rate, rng),
            None => SimulatedCondition::None,
        }
    }

    /// Uniform pick among `options`.
    pub fn pick<T: Copy>(&self, options: &[T]) -> Option<T> {
        if options.is_empty() {
            return None;
        }
        Some(self.with_rng(|rng| options[rng.gen_range(0..options.len())]))
    }

    /// Uniform duration in `[min_ms, max_ms]`.
    pub fn uniform_delay(&self, min_ms: u64, max_ms: u64) -> Duration {
        self.with_rng(|rng| uniform_duration(rng, min_ms, max_ms))
    }

    /// Run `f` with exclusive access to the policy's generator.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Swap in new site tables. The error rate is left as is.
    pub fn replace_profile(&self, profile: FaultProfile) {
        self.profile.store(Arc::new(profile));
    }

    pub fn profile(&self) -> Arc<FaultProfile> {
        self.profile.load_full()
    }
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self {
            error_rate_bits: AtomicU64::new(Self::DEFAULT_ERROR_RATE.to_bits()),
            profile: ArcSwap::from_pointee(FaultProfile::builtin()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

fn check_rate(value: f64) -> Result<(), PolicyError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(PolicyError::InvalidParameter { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::profile::{sites, FaultEffect, FaultRule};
    use std::collections::HashMap;
    use std::thread;

    fn seeded(rate: f64) -> FaultPolicy {
        FaultPolicy::new(rate, FaultProfile::builtin(), Some(1234)).unwrap()
    }

    #[test]
    fn test_default_rate() {
        assert_eq!(FaultPolicy::default().error_rate(), 3.0);
    }

    #[test]
    fn test_set_then_get_returns_exact_value() {
        let policy = FaultPolicy::default();
        for value in [0.0, 0.1, 3.0, 12.5, 33.333, 99.99, 100.0] {
            policy.set_error_rate(value).unwrap();
            assert_eq!(policy.error_rate(), value);
        }
    }

    #[test]
    fn test_set_returns_previous_value() {
        let policy = FaultPolicy::default();
        assert_eq!(policy.set_error_rate(10.0), Ok(3.0));
        assert_eq!(policy.set_error_rate(20.0), Ok(10.0));
    }

    #[test]
    fn test_rejects_out_of_range_without_change() {
        let policy = FaultPolicy::default();
        policy.set_error_rate(42.0).unwrap();
        for bad in [-0.001, 100.001, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -50.0] {
            let err = policy.set_error_rate(bad).unwrap_err();
            assert!(matches!(err, PolicyError::InvalidParameter { .. }));
            assert_eq!(policy.error_rate(), 42.0);
        }
    }

    #[test]
    fn test_new_rejects_invalid_initial_rate() {
        assert!(FaultPolicy::new(150.0, FaultProfile::builtin(), None).is_err());
    }

    #[test]
    fn test_concurrent_setters_leave_one_of_the_inputs() {
        let policy = Arc::new(FaultPolicy::default());
        let inputs: Vec<f64> = (0..16).map(|i| i as f64 * 6.25).collect();

        let handles: Vec<_> = inputs
            .iter()
            .copied()
            .map(|value| {
                let policy = policy.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        policy.set_error_rate(value).unwrap();
                        let seen = policy.error_rate();
                        assert!((0.0..=100.0).contains(&seen));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let last = policy.error_rate();
        assert!(inputs.contains(&last), "final value {} was never written", last);
    }

    #[test]
    fn test_unknown_site_never_faults() {
        let policy = seeded(100.0);
        for _ in 0..1_000 {
            assert!(policy.decide("no-such-site").is_none());
        }
    }

    fn tally(policy: &FaultPolicy, site: &str, trials: usize) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for _ in 0..trials {
            *counts.entry(policy.decide(site).label()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_condition_rates_rise_with_error_rate() {
        const TRIALS: usize = 20_000;
        let rates = [2.0, 10.0, 30.0, 60.0, 90.0];
        let categories = ["latency_spike", "resource_error", "crash_error"];

        let mut previous: Option<HashMap<&'static str, usize>> = None;
        for rate in rates {
            let counts = tally(&seeded(rate), sites::DATABASE, TRIALS);
            if let Some(prev) = &previous {
                for category in categories {
                    let before = *prev.get(category).unwrap_or(&0) as f64;
                    let after = *counts.get(category).unwrap_or(&0) as f64;
                    // Allow three standard deviations of sampling noise.
                    let tolerance = 3.0 * before.max(1.0).sqrt();
                    assert!(
                        after + tolerance >= before,
                        "{} dropped from {} to {} at rate {}",
                        category,
                        before,
                        after,
                        rate
                    );
                }
            }
            previous = Some(counts);
        }
    }

    #[test]
    fn test_condition_ratios_stay_fixed_as_rate_moves() {
        const TRIALS: usize = 60_000;
        let mut profile = FaultProfile::empty();
        profile.insert(
            "ratio",
            vec![
                FaultRule::new(0.2, FaultEffect::Unavailable),
                FaultRule::new(0.4, FaultEffect::Crash { kinds: Vec::new() }),
            ],
        );

        for rate in [20.0, 80.0] {
            let policy = FaultPolicy::new(rate, profile.clone(), Some(99)).unwrap();
            let counts = tally(&policy, "ratio", TRIALS);
            let unavailable = counts["unavailable"] as f64;
            let crash = counts["crash_error"] as f64;
            let ratio = crash / unavailable;
            assert!((ratio - 2.0).abs() < 0.25, "ratio {} at rate {}", ratio, rate);

            let expected = TRIALS as f64 * rate / 100.0 * 0.6;
            let observed = unavailable + crash;
            assert!(
                (observed - expected).abs() < expected * 0.05,
                "observed {} expected {} at rate {}",
                observed,
                expected,
                rate
            );
        }
    }

    #[test]
    fn test_replace_profile_keeps_rate() {
        let policy = seeded(55.0);
        policy.replace_profile(FaultProfile::empty());
        assert_eq!(policy.error_rate(), 55.0);
        assert!(policy.decide(sites::FAST).is_none());
    }
}

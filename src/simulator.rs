//! Outcome simulation for the idempotency ledger.
//!
//! The ledger never talks to a real payment backend; every *new* record gets
//! its fate from an [`OutcomeDecider`]. The production decider is a weighted
//! random draw over a seedable RNG; tests and the demo script exact
//! sequences with [`ScriptedOutcomes`].

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Suggested wait, in seconds, attached to simulated transient failures.
const TRANSIENT_RETRY_AFTER_SECS: u64 = 1;

/// One of the three simulated gateway outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The record resolves right away; the response carries the final data.
    ImmediateSuccess,
    /// The record stays pending; the response signals a retryable failure.
    TransientFailure { retry_after_seconds: u64 },
    /// The record stays pending and flips to success on its own after the
    /// delay, whether or not the client polls again.
    DelayedSuccess { delay_ms: u64 },
}

/// Decision source for submission outcomes.
///
/// Injected into the ledger at construction so deterministic deciders can
/// replace ambient randomness in tests.
pub trait OutcomeDecider: Send + Sync {
    fn decide(&self) -> Outcome;
}

/// Relative weights for the random outcome draw.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OutcomeWeights {
    #[serde(default = "default_immediate_weight")]
    pub immediate: u32,
    #[serde(default = "default_transient_weight")]
    pub transient: u32,
    #[serde(default = "default_delayed_weight")]
    pub delayed: u32,
}

fn default_immediate_weight() -> u32 {
    50
}

fn default_transient_weight() -> u32 {
    25
}

fn default_delayed_weight() -> u32 {
    25
}

impl Default for OutcomeWeights {
    fn default() -> Self {
        Self {
            immediate: default_immediate_weight(),
            transient: default_transient_weight(),
            delayed: default_delayed_weight(),
        }
    }
}

/// Weighted random outcome decider over a seedable RNG.
pub struct RandomOutcome {
    weights: OutcomeWeights,
    delayed_min_ms: u64,
    delayed_max_ms: u64,
    rng: Mutex<StdRng>,
}

impl RandomOutcome {
    /// Decider seeded from OS entropy.
    pub fn new(weights: OutcomeWeights, delayed_min_ms: u64, delayed_max_ms: u64) -> Self {
        Self {
            weights,
            delayed_min_ms,
            delayed_max_ms,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic decider: the same seed yields the same outcome sequence.
    pub fn seeded(weights: OutcomeWeights, delayed_min_ms: u64, delayed_max_ms: u64, seed: u64) -> Self {
        Self {
            weights,
            delayed_min_ms,
            delayed_max_ms,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl OutcomeDecider for RandomOutcome {
    fn decide(&self) -> Outcome {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        let total = self.weights.immediate + self.weights.transient + self.weights.delayed;
        if total == 0 {
            return Outcome::ImmediateSuccess;
        }
        let roll = rng.gen_range(0..total);
        if roll < self.weights.immediate {
            Outcome::ImmediateSuccess
        } else if roll < self.weights.immediate + self.weights.transient {
            Outcome::TransientFailure {
                retry_after_seconds: TRANSIENT_RETRY_AFTER_SECS,
            }
        } else {
            let delay_ms = if self.delayed_max_ms > self.delayed_min_ms {
                rng.gen_range(self.delayed_min_ms..self.delayed_max_ms)
            } else {
                self.delayed_min_ms
            };
            Outcome::DelayedSuccess { delay_ms }
        }
    }
}

/// Fixed outcome sequence for tests and forced demo scenarios.
///
/// Pops outcomes in order; once a single entry remains it repeats forever,
/// so "always fails" scenarios need only one trailing entry.
pub struct ScriptedOutcomes {
    script: Mutex<VecDeque<Outcome>>,
}

impl ScriptedOutcomes {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

impl OutcomeDecider for ScriptedOutcomes {
    fn decide(&self) -> Outcome {
        let mut script = self.script.lock().expect("script lock poisoned");
        match script.len() {
            0 | 1 => script.front().copied().unwrap_or(Outcome::ImmediateSuccess),
            _ => script.pop_front().unwrap_or(Outcome::ImmediateSuccess),
        }
    }
}

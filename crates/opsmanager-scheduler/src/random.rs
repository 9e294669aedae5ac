//! Injectable randomness for corpus picks and probability rolls.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform floats in `[0, 1)`.
pub trait RandomSource: Send {
    fn next(&mut self) -> f64;
}

/// Production source backed by a seedable `StdRng`.
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Deterministic stream for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for StdRandom {
    fn next(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}

/// Replays a fixed list of values in a loop. Used to force branches in
/// tests and to replay a recorded session.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for ScriptedRandom {
    fn next(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}

/// Bernoulli trial: `true` with probability `p`.
pub fn chance(rng: &mut dyn RandomSource, p: f64) -> bool {
    rng.next() < p
}

/// Uniform integer in `[0, n)`. Out-of-range draws are clamped to the ends.
pub fn index(rng: &mut dyn RandomSource, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let scaled = (rng.next().clamp(0.0, 1.0) * n as f64).floor() as usize;
    scaled.min(n - 1)
}

/// Uniform pick from a non-empty corpus.
pub fn pick<'a>(rng: &mut dyn RandomSource, corpus: &[&'a str]) -> &'a str {
    corpus.get(index(rng, corpus.len())).copied().unwrap_or_default()
}

//! Randomness sources for lottery draws.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// Produces lottery draw numbers.
///
/// The only source of nondeterminism in the rotation core. Swap in a
/// seeded or scripted source to make draws reproducible.
pub trait DrawSource {
    /// Uniform integer in `min..=max`. Swapped bounds are treated as the
    /// same range.
    fn draw(&mut self, min: u32, max: u32) -> u32;
}

fn ordered(min: u32, max: u32) -> (u32, u32) {
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

/// ChaCha8-backed draws. Not a cryptographic commitment scheme.
#[derive(Debug, Clone)]
pub struct SeededDraws {
    rng: ChaCha8Rng,
}

impl SeededDraws {
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: ChaCha8Rng::from_entropy() }
    }
}

impl DrawSource for SeededDraws {
    fn draw(&mut self, min: u32, max: u32) -> u32 {
        let (low, high) = ordered(min, max);
        self.rng.gen_range(low..=high)
    }
}

/// Replays a scripted sequence of draw numbers, then falls back to a
/// seeded generator once the script runs out.
#[derive(Debug, Clone)]
pub struct FixedDraws {
    script: VecDeque<u32>,
    fallback: SeededDraws,
}

impl FixedDraws {
    pub fn new(script: impl IntoIterator<Item = u32>) -> Self {
        Self { script: script.into_iter().collect(), fallback: SeededDraws::from_seed(0) }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DrawSource for FixedDraws {
    fn draw(&mut self, min: u32, max: u32) -> u32 {
        let (low, high) = ordered(min, max);
        match self.script.pop_front() {
            Some(value) => value.clamp(low, high),
            None => self.fallback.draw(min, max),
        }
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Object-safe random source. Everything in the engine that rolls dice
/// (bot accuracy, mystery rewards, trap spawns, freeze targets) goes
/// through this trait so tests can supply a deterministic sequence.
pub trait RngSource: Send {
    /// Uniform float in [0, 1).
    fn next_f32(&mut self) -> f32;

    /// Uniform integer in [0, bound). Returns 0 when `bound` is 0.
    fn next_index(&mut self, bound: usize) -> usize;

    /// Uniform float in [lo, hi).
    fn range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.next_f32() * (hi - lo)
    }

    /// Fisher-Yates shuffle.
    fn shuffle_indices(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        for i in (1..len).rev() {
            let j = self.next_index(i + 1);
            order.swap(i, j);
        }
        order
    }
}

/// Production source backed by the thread-local generator.
#[derive(Debug, Default)]
pub struct ThreadRngSource;

impl RngSource for ThreadRngSource {
    fn next_f32(&mut self) -> f32 {
        rand::rng().random()
    }

    fn next_index(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        rand::rng().random_range(0..bound)
    }
}

/// Deterministic source for tests and replays.
#[derive(Debug)]
pub struct SeededRngSource {
    rng: StdRng,
}

impl SeededRngSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RngSource for SeededRngSource {
    fn next_f32(&mut self) -> f32 {
        self.rng.random()
    }

    fn next_index(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        self.rng.random_range(0..bound)
    }
}

//! Random sources for the weighted selector.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::RandomSource;

/// Draws from the calling thread's generator, so concurrent requests never
/// contend on shared state.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn draw(&self, upper: u32) -> u32 {
        rand::thread_rng().gen_range(0..=upper)
    }
}

/// Reproducible source for tests and demos. Shared draws are serialized
/// through a mutex.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn draw(&self, upper: u32) -> u32 {
        // A poisoned lock only means another draw panicked; the generator
        // state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..=upper)
    }
}

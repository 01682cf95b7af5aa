//! Uniform random permutation of index positions.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Produces uniformly random permutations.
///
/// Without a seed the generator draws from OS entropy, so every run orders
/// records differently. A seed makes the order reproducible.
pub struct Shuffler {
    rng: ChaCha8Rng,
}

impl Shuffler {
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64),
        }
    }

    /// `n` distinct integers covering `0..n` in random order.
    pub fn permute(&mut self, n: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut self.rng);
        indices
    }
}

impl Default for Shuffler {
    fn default() -> Self {
        Self::new(None)
    }
}

//! Seedable random source for the resampling stages.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use siphasher::sip::SipHasher13;

/// Random source handed explicitly to every randomized stage.
///
/// There is no process-wide generator: callers pick the seed, usually a
/// substream of the run's master seed, so merge decisions replay exactly
/// after a restart.
#[derive(Debug, Clone)]
pub struct RngHandle {
    seed: u64,
    rng: StdRng,
}

impl RngHandle {
    /// Generator seeded with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generator for stream `substream` of `master_seed`.
    pub fn for_substream(master_seed: u64, substream: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, substream))
    }

    /// Seed the generator started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw from `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Roulette-wheel draw: index `i` with probability `shares[i] / sum(shares)`.
    ///
    /// Consumes exactly one uniform draw. Returns `None` when the shares do
    /// not sum to a positive finite value.
    pub fn pick_weighted(&mut self, shares: &[f64]) -> Option<usize> {
        let total: f64 = shares.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        let mut threshold = self.uniform() * total;
        for (index, share) in shares.iter().enumerate() {
            if threshold < *share {
                return Some(index);
            }
            threshold -= share;
        }
        // rounding can leave the threshold just past the last share
        shares.iter().rposition(|share| *share > 0.0)
    }
}

/// Seed of stream `substream` of `master_seed` (SipHash-1-3, zero keys).
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

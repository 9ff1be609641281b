//! Deterministic random number generation for synthetic ridership.
//!
//! RULE: Generated tap logs never touch a platform RNG.
//! Every card draws from its own stream, seeded from
//! (master_seed XOR stream index). Adding cards to a network therefore
//! never changes the rides of the cards already there.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct TapRng {
    inner: Pcg64Mcg,
}

impl TapRng {
    /// The stream index must be stable for the thing it drives.
    pub fn new(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n). `n` of zero always yields zero.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    /// Pick an index into a slice of length `len`.
    pub fn pick(&mut self, len: usize) -> usize {
        self.next_u64_below(len as u64) as usize
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

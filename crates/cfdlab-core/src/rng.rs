//! Seeded random stream for a lab session.
//!
//! Wraps ChaCha8 so a session is reproducible from its seed, and records the
//! stream position on save so a loaded session continues with the exact
//! draws it would have made.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Session random number generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "LabRngState", into = "LabRngState")]
pub struct LabRng {
    rng: ChaCha8Rng,
    seed: u64,
}

#[derive(Serialize, Deserialize)]
struct LabRngState {
    seed: u64,
    word_pos: u128,
}

impl From<LabRngState> for LabRng {
    fn from(state: LabRngState) -> Self {
        let mut rng = LabRng::new(state.seed);
        rng.rng.set_word_pos(state.word_pos);
        rng
    }
}

impl From<LabRng> for LabRngState {
    fn from(rng: LabRng) -> Self {
        Self {
            seed: rng.seed,
            word_pos: rng.rng.get_word_pos(),
        }
    }
}

impl LabRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a new RNG with a random seed
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RngCore for LabRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

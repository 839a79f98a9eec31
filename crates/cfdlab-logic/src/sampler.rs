//! Injectable uniform randomness.
//!
//! Every random decision in this crate goes through [`Sampler`], so the
//! decision logic can be driven by a seeded `rand` generator in play and by
//! [`ScriptedDraws`] in tests.
//!
//! ```
//! use cfdlab_logic::sampler::{Sampler, ScriptedDraws};
//!
//! let mut draws = ScriptedDraws::new(vec![0.25, 0.75]);
//! assert!(draws.chance(0.5));
//! assert!(!draws.chance(0.5));
//! ```

use rand::{Rng, RngCore};

/// A source of uniform draws in `[0, 1)`.
pub trait Sampler {
    /// Next uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform draw in `[-0.5, 0.5)`.
    fn centered(&mut self) -> f64 {
        self.unit() - 0.5
    }

    /// Bernoulli trial: true when the draw falls below `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Uniform integer in `lo..=hi`. Returns `lo` when the range is empty.
    fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as f64;
        let offset = (self.unit() * span) as i32;
        lo + offset.min(hi - lo)
    }

    /// Uniform index in `0..n`. Returns 0 when `n` is 0.
    fn pick(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        ((self.unit() * n as f64) as usize).min(n - 1)
    }
}

impl<R: RngCore + ?Sized> Sampler for R {
    fn unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedDraws {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedDraws {
    /// Draws outside `[0, 1)` are clamped into it.
    pub fn new(draws: Vec<f64>) -> Self {
        let draws = if draws.is_empty() {
            vec![0.5]
        } else {
            draws
                .into_iter()
                .map(|d| d.clamp(0.0, 1.0 - f64::EPSILON))
                .collect()
        };
        Self { draws, cursor: 0 }
    }

    /// The same draw forever.
    pub fn constant(draw: f64) -> Self {
        Self::new(vec![draw])
    }

    /// Number of draws consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl Sampler for ScriptedDraws {
    fn unit(&mut self) -> f64 {
        let d = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn scripted_draws_cycle() {
        let mut s = ScriptedDraws::new(vec![0.1, 0.2]);
        assert_eq!(s.unit(), 0.1);
        assert_eq!(s.unit(), 0.2);
        assert_eq!(s.unit(), 0.1);
        assert_eq!(s.consumed(), 3);
    }

    #[test]
    fn scripted_draws_clamped_into_unit_interval() {
        let mut s = ScriptedDraws::new(vec![-1.0, 2.0]);
        assert_eq!(s.unit(), 0.0);
        assert!(s.unit() < 1.0);
    }

    #[test]
    fn empty_script_falls_back_to_midpoint() {
        let mut s = ScriptedDraws::new(Vec::new());
        assert_eq!(s.unit(), 0.5);
        assert_eq!(s.centered(), 0.0);
    }

    #[test]
    fn range_inclusive_hits_both_ends() {
        assert_eq!(ScriptedDraws::constant(0.0).range_inclusive(20, 50), 20);
        assert_eq!(ScriptedDraws::constant(0.999_999).range_inclusive(20, 50), 50);
        assert_eq!(ScriptedDraws::constant(0.3).range_inclusive(7, 7), 7);
    }

    #[test]
    fn pick_stays_in_bounds() {
        assert_eq!(ScriptedDraws::constant(0.999_999).pick(4), 3);
        assert_eq!(ScriptedDraws::constant(0.0).pick(4), 0);
        assert_eq!(ScriptedDraws::constant(0.5).pick(0), 0);
    }

    #[test]
    fn rand_generators_are_samplers() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            let u = rng.unit();
            assert!((0.0..1.0).contains(&u));
            let c = rng.centered();
            assert!((-0.5..0.5).contains(&c));
        }
    }
}

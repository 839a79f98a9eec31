//! Pure simulation logic for CFD Lab.
//!
//! This crate contains all game logic that is independent of any session,
//! engine, or UI. Functions take plain data plus an injected [`Sampler`]
//! and return results, making them unit-testable with scripted draws and
//! reproducible with a seeded generator.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`hardware`] | Compute hardware tiers and throughput multipliers |
//! | [`research`] | Datasets from converged runs, paper drafts, journals |
//! | [`review`] | Peer-review battle between the paper and Reviewer #2 |
//! | [`sampler`] | Injectable uniform randomness, scripted draws for tests |
//! | [`solver`] | Divergence risk, residual recurrence, run lifecycle |
//! | [`tuning`] | Solver coefficients and their validation |
//!
//! [`Sampler`]: sampler::Sampler

pub mod hardware;
pub mod research;
pub mod review;
pub mod sampler;
pub mod solver;
pub mod tuning;

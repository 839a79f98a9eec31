//! CFD Lab Core - research session engine
//!
//! Wraps the pure rules of `cfdlab_logic` into a playable session: a
//! researcher with funds, energy and reputation drives a solver run to
//! convergence, harvests datasets, binds them into papers and fights them
//! through peer review.
//!
//! # Example
//!
//! ```rust,no_run
//! use cfdlab_core::prelude::*;
//!
//! let mut lab = Lab::new(42);
//! lab.set_knobs(1.0, 0.7);
//!
//! // Solve until something happens
//! while lab.phase() == RunPhase::Ready {
//!     if lab.run_step().unwrap().is_declined() {
//!         lab.end_day();
//!     }
//! }
//! ```

pub mod config;
pub mod lab;
pub mod persistence;
pub mod rng;

pub use lab::LabError;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::LabConfig;
    pub use crate::lab::{
        Attempt, AutoRun, Lab, LabError, Researcher, Resource, SolverKnobs, FAILURE_REASONS,
    };
    pub use crate::persistence::SaveError;
    pub use cfdlab_logic::hardware::HardwareTier;
    pub use cfdlab_logic::research::{Dataset, DraftPaper, Journal};
    pub use cfdlab_logic::review::{AuthorMove, Verdict};
    pub use cfdlab_logic::solver::{RiskModifiers, RunPhase, StepOutcome};
}

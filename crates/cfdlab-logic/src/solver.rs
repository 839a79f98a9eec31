//! Convergence and divergence simulation for a single solver run.
//!
//! A [`RunState`] tracks one attempt: its progress bar, the residual trace
//! shown on the monitor, and whether the run has blown up. The functions in
//! this module are the only way to mutate it:
//!
//! | Operation | From | To |
//! |-----------|------|----|
//! | [`step`] | Ready | Ready, Diverged or Completed |
//! | [`recover_from_divergence`] | Diverged | Ready |
//! | [`reset`] | any | Ready (fresh run) |
//!
//! # Risk model
//!
//! [`compute_divergence_risk`] multiplies a base term growing with
//! `cfl^cfl_exponent` by a stability term that shrinks as the relaxation
//! factor approaches 1, adds penalties for mesh quality, scenario difficulty
//! and feature count, subtracts skill and equipment mitigations, and clamps
//! the result to `[risk_min, risk_max]`.
//!
//! ```
//! use cfdlab_logic::solver::{compute_divergence_risk, StepInputs};
//! use cfdlab_logic::tuning::SolverTuning;
//!
//! let tuning = SolverTuning::default();
//! let calm = compute_divergence_risk(&StepInputs::new(0.5, 0.7), &tuning);
//! let fast = compute_divergence_risk(&StepInputs::new(5.0, 0.7), &tuning);
//! assert!(calm < fast);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hardware::HardwareTier;
use crate::sampler::Sampler;
use crate::tuning::SolverTuning;

/// Lowest CFL number the console offers.
pub const CFL_MIN: f64 = 0.1;
/// Highest CFL number the console offers.
pub const CFL_MAX: f64 = 5.0;
/// Lowest relaxation factor the console offers.
pub const RELAXATION_MIN: f64 = 0.1;
/// Highest relaxation factor (no under-relaxation).
pub const RELAXATION_MAX: f64 = 1.0;

/// Risk adjustments that come from outside the solver knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskModifiers {
    /// Mesh quality, 0.0 (garbage) to 1.0 (pristine).
    pub mesh_quality: f64,
    /// Additive risk from the case setup (e.g. a nasty turbulence model).
    pub difficulty: f64,
    /// Number of extra physics features bolted onto the case.
    pub feature_count: u32,
    /// Researcher skill, 0.0–1.0.
    pub skill: f64,
    /// Flat risk reduction from equipment.
    pub equipment_discount: f64,
}

impl Default for RiskModifiers {
    fn default() -> Self {
        Self {
            mesh_quality: 1.0,
            difficulty: 0.0,
            feature_count: 0,
            skill: 0.0,
            equipment_discount: 0.0,
        }
    }
}

/// Caller-owned inputs for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepInputs {
    /// Courant number (> 0).
    pub cfl: f64,
    /// Under-relaxation factor in (0, 1].
    pub relaxation: f64,
    pub modifiers: RiskModifiers,
    /// Throughput of the hardware running the case (> 0).
    pub hardware_multiplier: f64,
}

impl StepInputs {
    /// Inputs with no risk modifiers on laptop-grade hardware.
    pub fn new(cfl: f64, relaxation: f64) -> Self {
        Self {
            cfl,
            relaxation,
            modifiers: RiskModifiers::default(),
            hardware_multiplier: HardwareTier::Laptop.throughput(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: RiskModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_hardware(mut self, tier: HardwareTier) -> Self {
        self.hardware_multiplier = tier.throughput();
        self
    }

    /// Check every field against its documented domain.
    pub fn validate(&self) -> Result<(), SolverError> {
        let m = &self.modifiers;
        let checks = [
            ("cfl", self.cfl, self.cfl > 0.0),
            (
                "relaxation",
                self.relaxation,
                self.relaxation > 0.0 && self.relaxation <= RELAXATION_MAX,
            ),
            (
                "hardware_multiplier",
                self.hardware_multiplier,
                self.hardware_multiplier > 0.0,
            ),
            (
                "mesh_quality",
                m.mesh_quality,
                (0.0..=1.0).contains(&m.mesh_quality),
            ),
            ("difficulty", m.difficulty, m.difficulty >= 0.0),
            ("skill", m.skill, (0.0..=1.0).contains(&m.skill)),
            (
                "equipment_discount",
                m.equipment_discount,
                m.equipment_discount >= 0.0,
            ),
        ];
        for (field, value, ok) in checks {
            if !value.is_finite() || !ok {
                return Err(SolverError::InvalidInput { field, value });
            }
        }
        Ok(())
    }
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Running,
    Diverged,
    Completed,
}

impl StepOutcome {
    /// Diverged and Completed end a batch.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepOutcome::Diverged | StepOutcome::Completed)
    }
}

/// Where a run sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Ready,
    Diverged,
    Completed,
}

/// Caller misuse of the solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("run has diverged; recover or reset before stepping")]
    AlreadyDiverged,
    #[error("run already completed; extract or reset before stepping")]
    AlreadyCompleted,
    #[error("run is not diverged; nothing to recover")]
    NotDiverged,
    #[error("invalid {field}: {value}")]
    InvalidInput { field: &'static str, value: f64 },
}

/// Numeric state of one solver attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    progress: f64,
    residuals: Vec<f64>,
    diverged: bool,
}

impl RunState {
    /// Fresh run: zero progress, residuals seeded, not diverged.
    pub fn new(tuning: &SolverTuning) -> Self {
        Self {
            progress: 0.0,
            residuals: vec![tuning.seed_residual],
            diverged: false,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Progress as shown to the player, capped at the completion threshold.
    pub fn display_progress(&self, tuning: &SolverTuning) -> f64 {
        self.progress.min(tuning.completion_threshold)
    }

    /// Full residual history, oldest first.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn last_residual(&self) -> f64 {
        self.residuals.last().copied().unwrap_or(f64::NAN)
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    pub fn phase(&self, tuning: &SolverTuning) -> RunPhase {
        if self.diverged {
            RunPhase::Diverged
        } else if self.progress >= tuning.completion_threshold {
            RunPhase::Completed
        } else {
            RunPhase::Ready
        }
    }

    fn ensure_steppable(&self, tuning: &SolverTuning) -> Result<(), SolverError> {
        match self.phase(tuning) {
            RunPhase::Ready => Ok(()),
            RunPhase::Diverged => Err(SolverError::AlreadyDiverged),
            RunPhase::Completed => Err(SolverError::AlreadyCompleted),
        }
    }
}

/// Probability that the next step diverges, clamped to
/// `[tuning.risk_min, tuning.risk_max]`.
///
/// Pure; does not validate `inputs` (see [`StepInputs::validate`]).
pub fn compute_divergence_risk(inputs: &StepInputs, tuning: &SolverTuning) -> f64 {
    let m = &inputs.modifiers;
    let speed_term = inputs.cfl.max(0.0).powf(tuning.cfl_exponent);
    let stability_term = (tuning.relaxation_ceiling - inputs.relaxation).max(0.0);

    let raw = tuning.base_risk * speed_term * stability_term
        + (1.0 - m.mesh_quality) * tuning.mesh_penalty
        + m.difficulty
        + m.feature_count as f64 * tuning.feature_penalty
        - m.skill * tuning.skill_mitigation
        - m.equipment_discount;

    if !raw.is_finite() {
        return tuning.risk_max;
    }
    // An inverted range (rejected by `validate_tuning`) yields `risk_max`.
    raw.max(tuning.risk_min).min(tuning.risk_max)
}

/// Progress gained by one non-divergent step.
pub fn progress_per_step(inputs: &StepInputs, tuning: &SolverTuning) -> f64 {
    inputs.cfl * inputs.hardware_multiplier * tuning.progress_per_cfl
}

/// Advance the run by one step.
///
/// Draws once for the divergence trial and, when the run survives, once
/// more for residual noise. Exactly one residual is appended either way.
pub fn step(
    state: &mut RunState,
    inputs: &StepInputs,
    tuning: &SolverTuning,
    sampler: &mut impl Sampler,
) -> Result<StepOutcome, SolverError> {
    inputs.validate()?;
    let risk = compute_divergence_risk(inputs, tuning);
    step_with_risk(state, inputs, risk, tuning, sampler)
}

/// [`step`] with the divergence probability supplied by the caller instead
/// of the risk model.
pub fn step_with_risk(
    state: &mut RunState,
    inputs: &StepInputs,
    risk: f64,
    tuning: &SolverTuning,
    sampler: &mut impl Sampler,
) -> Result<StepOutcome, SolverError> {
    state.ensure_steppable(tuning)?;
    inputs.validate()?;
    if !(0.0..=1.0).contains(&risk) {
        return Err(SolverError::InvalidInput {
            field: "risk",
            value: risk,
        });
    }

    if sampler.chance(risk) {
        state.diverged = true;
        state.residuals.push(tuning.blowup_residual);
        return Ok(StepOutcome::Diverged);
    }

    state.progress += progress_per_step(inputs, tuning);

    let last = state.residuals.last().copied().unwrap_or(tuning.seed_residual);
    let drop = tuning.drop_per_relaxation * inputs.relaxation;
    let noise = sampler.centered() * inputs.cfl * tuning.noise_per_cfl;
    state
        .residuals
        .push((last + drop + noise).max(tuning.residual_floor));

    if state.progress >= tuning.completion_threshold {
        Ok(StepOutcome::Completed)
    } else {
        Ok(StepOutcome::Running)
    }
}

/// Manually pull a diverged run back to a steppable state.
///
/// Appends `last - penalty` and returns it. Progress is untouched.
pub fn recover_from_divergence(state: &mut RunState, penalty: f64) -> Result<f64, SolverError> {
    if !state.diverged {
        return Err(SolverError::NotDiverged);
    }
    if !penalty.is_finite() {
        return Err(SolverError::InvalidInput {
            field: "penalty",
            value: penalty,
        });
    }
    let recovered = state.last_residual() - penalty;
    state.residuals.push(recovered);
    state.diverged = false;
    Ok(recovered)
}

/// Discard the attempt and start over from the seed residual.
pub fn reset(state: &mut RunState, tuning: &SolverTuning) {
    state.residuals.clear();
    state.residuals.push(tuning.seed_residual);
    state.progress = 0.0;
    state.diverged = false;
}

/// Everything a batch produced, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<StepOutcome>,
    pub residuals: Vec<f64>,
}

impl BatchReport {
    pub fn steps(&self) -> usize {
        self.outcomes.len()
    }

    pub fn last_outcome(&self) -> Option<StepOutcome> {
        self.outcomes.last().copied()
    }
}

/// Run up to `max_steps` steps, stopping at the first Diverged or Completed.
pub fn run_batch(
    state: &mut RunState,
    inputs: &StepInputs,
    max_steps: usize,
    tuning: &SolverTuning,
    sampler: &mut impl Sampler,
) -> Result<BatchReport, SolverError> {
    state.ensure_steppable(tuning)?;
    inputs.validate()?;

    let mut report = BatchReport::default();
    for _ in 0..max_steps {
        let outcome = step(state, inputs, tuning, sampler)?;
        report.outcomes.push(outcome);
        report.residuals.push(state.last_residual());
        if outcome.is_terminal() {
            break;
        }
    }
    Ok(report)
}

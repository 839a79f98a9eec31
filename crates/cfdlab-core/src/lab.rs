//! Lab session - main entry point for playing the research loop.
//!
//! A [`Lab`] owns the researcher's resources, the current solver run, the
//! solver console log and the session's random stream. Every player action
//! is one method call; the numeric rules all live in `cfdlab_logic`.

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cfdlab_logic::hardware::HardwareTier;
use cfdlab_logic::research::{self, Dataset, DraftError, DraftPaper, Journal};
use cfdlab_logic::review::{
    AuthorMove, ReviewBattle, ReviewError, TurnReport, Verdict, ACCEPTANCE_FUNDS,
    ACCEPTANCE_REPUTATION,
};
use cfdlab_logic::sampler::Sampler;
use cfdlab_logic::solver::{
    self, BatchReport, RiskModifiers, RunPhase, RunState, SolverError, StepInputs, StepOutcome,
    CFL_MAX, CFL_MIN, RELAXATION_MAX, RELAXATION_MIN,
};
use cfdlab_logic::tuning::TuningError;

use crate::config::LabConfig;
use crate::rng::LabRng;

/// What the console prints when a run blows up.
pub const FAILURE_REASONS: [&str; 4] = [
    "Floating point exception!",
    "Negative cell volume detected",
    "Continuity residual overflow",
    "Turbulence viscosity ratio limited in 40% of cells",
];

/// Errors from lab actions taken in the wrong state.
#[derive(Debug, Error)]
pub enum LabError {
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("invalid solver tuning: {0:?}")]
    InvalidTuning(Vec<TuningError>),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("run has not converged yet")]
    RunNotComplete,
    #[error("no dataset at index {0}")]
    NoSuchDataset(usize),
    #[error("dataset {0} selected twice")]
    DuplicateDataset(usize),
    #[error("a draft is already waiting for submission")]
    DraftPending,
    #[error("no draft to submit")]
    NoDraft,
    #[error("a review is already in progress")]
    ReviewInProgress,
    #[error("no review in progress")]
    NoReview,
}

/// A spendable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Energy,
    Funds,
}

/// Result of an action that costs resources.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Done(T),
    /// Not affordable; nothing changed.
    Declined {
        resource: Resource,
        needed: i64,
        available: i64,
    },
}

impl<T> Attempt<T> {
    pub fn is_declined(&self) -> bool {
        matches!(self, Attempt::Declined { .. })
    }

    pub fn done(self) -> Option<T> {
        match self {
            Attempt::Done(t) => Some(t),
            Attempt::Declined { .. } => None,
        }
    }
}

/// Outcome of an auto-run.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoRun {
    pub batch: BatchReport,
    /// The batch was cut short because energy ran out.
    pub budget_limited: bool,
}

/// The principal investigator's resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Researcher {
    pub day: u32,
    pub funds: i64,
    pub reputation: i64,
    pub energy: u32,
    pub hardware: HardwareTier,
    pub datasets: Vec<Dataset>,
}

/// Solver console sliders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverKnobs {
    pub cfl: f64,
    pub relaxation: f64,
}

impl Default for SolverKnobs {
    fn default() -> Self {
        Self {
            cfl: 1.0,
            relaxation: 0.7,
        }
    }
}

/// One research group's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lab {
    config: LabConfig,
    researcher: Researcher,
    knobs: SolverKnobs,
    modifiers: RiskModifiers,
    run: RunState,
    log: VecDeque<String>,
    last_failure: Option<String>,
    draft: Option<DraftPaper>,
    battle: Option<ReviewBattle>,
    rng: LabRng,
}

impl Lab {
    /// New session with the default configuration.
    pub fn new(seed: u64) -> Self {
        Self::build(LabConfig::default(), LabRng::new(seed))
    }

    /// New session with a custom configuration.
    pub fn with_config(config: LabConfig, seed: u64) -> Result<Self, LabError> {
        config.validate()?;
        Ok(Self::build(config, LabRng::new(seed)))
    }

    fn build(config: LabConfig, rng: LabRng) -> Self {
        let researcher = Researcher {
            day: 1,
            funds: config.starting_funds,
            reputation: 0,
            energy: config.max_energy,
            hardware: HardwareTier::Laptop,
            datasets: Vec::new(),
        };
        let run = RunState::new(&config.tuning);
        let mut lab = Self {
            config,
            researcher,
            knobs: SolverKnobs::default(),
            modifiers: RiskModifiers::default(),
            run,
            log: VecDeque::new(),
            last_failure: None,
            draft: None,
            battle: None,
            rng,
        };
        lab.push_log("Ready to solve...".to_string());
        lab
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn config_mut(&mut self) -> &mut LabConfig {
        &mut self.config
    }

    pub fn researcher(&self) -> &Researcher {
        &self.researcher
    }

    pub fn knobs(&self) -> SolverKnobs {
        self.knobs
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn phase(&self) -> RunPhase {
        self.run.phase(&self.config.tuning)
    }

    /// Console log, newest first.
    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    /// Why the current run blew up, if it has.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn draft(&self) -> Option<DraftPaper> {
        self.draft
    }

    pub fn battle(&self) -> Option<&ReviewBattle> {
        self.battle.as_ref()
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    // ── Settings ───────────────────────────────────────────────────────

    /// Move the sliders. Values are clamped to the console's ranges.
    pub fn set_knobs(&mut self, cfl: f64, relaxation: f64) {
        self.knobs = SolverKnobs {
            cfl: clamp_or(cfl, CFL_MIN, CFL_MAX, self.knobs.cfl),
            relaxation: clamp_or(
                relaxation,
                RELAXATION_MIN,
                RELAXATION_MAX,
                self.knobs.relaxation,
            ),
        };
    }

    pub fn set_modifiers(&mut self, modifiers: RiskModifiers) -> Result<(), LabError> {
        StepInputs::new(self.knobs.cfl, self.knobs.relaxation)
            .with_modifiers(modifiers)
            .validate()?;
        self.modifiers = modifiers;
        Ok(())
    }

    pub fn set_hardware(&mut self, tier: HardwareTier) {
        info!("Hardware switched to {}", tier.label());
        self.researcher.hardware = tier;
    }

    /// Inputs the next step would use.
    pub fn step_inputs(&self) -> StepInputs {
        StepInputs::new(self.knobs.cfl, self.knobs.relaxation)
            .with_modifiers(self.modifiers)
            .with_hardware(self.researcher.hardware)
    }

    /// Divergence probability of the next step at the current settings.
    pub fn divergence_risk(&self) -> f64 {
        solver::compute_divergence_risk(&self.step_inputs(), &self.config.tuning)
    }

    // ── Solver ─────────────────────────────────────────────────────────

    /// Iterate the solver once, if the researcher has the energy.
    pub fn run_step(&mut self) -> Result<Attempt<StepOutcome>, LabError> {
        let cost = self.config.step_energy_cost;
        if let Some(declined) = self.check_energy(cost) {
            warn!("Step declined: {} energy needed", cost);
            return Ok(declined);
        }

        let inputs = self.step_inputs();
        let outcome = solver::step(&mut self.run, &inputs, &self.config.tuning, &mut self.rng)?;
        self.researcher.energy -= cost;
        let iteration = self.run.residuals().len();
        let residual = self.run.last_residual();
        self.record_outcome(outcome, iteration, residual);
        Ok(Attempt::Done(outcome))
    }

    /// Run up to `max_steps` steps, stopping at the first terminal outcome
    /// or when energy runs out.
    pub fn auto_run(&mut self, max_steps: usize) -> Result<Attempt<AutoRun>, LabError> {
        let cost = self.config.step_energy_cost;
        let affordable = if cost == 0 {
            max_steps
        } else {
            (self.researcher.energy / cost) as usize
        };
        if max_steps > 0 && affordable == 0 {
            warn!("Auto-run declined: {} energy needed", cost);
            return Ok(Attempt::Declined {
                resource: Resource::Energy,
                needed: cost as i64,
                available: self.researcher.energy as i64,
            });
        }

        let steps = max_steps.min(affordable);
        let inputs = self.step_inputs();
        let start_len = self.run.residuals().len();
        let batch = solver::run_batch(
            &mut self.run,
            &inputs,
            steps,
            &self.config.tuning,
            &mut self.rng,
        )?;
        self.researcher.energy -= cost * batch.steps() as u32;
        let steps_taken = batch.outcomes.iter().zip(&batch.residuals).enumerate();
        for (i, (&outcome, &residual)) in steps_taken {
            self.record_outcome(outcome, start_len + i + 1, residual);
        }

        let budget_limited =
            steps < max_steps && batch.last_outcome().map_or(true, |o| !o.is_terminal());
        info!(
            "Auto-run: {} of {} steps, last outcome {:?}",
            batch.steps(),
            max_steps,
            batch.last_outcome()
        );
        Ok(Attempt::Done(AutoRun {
            batch,
            budget_limited,
        }))
    }

    /// Manually rescue a diverged run.
    pub fn recover(&mut self) -> Result<Attempt<f64>, LabError> {
        if !self.run.is_diverged() {
            return Err(SolverError::NotDiverged.into());
        }
        let cost = self.config.recover_energy_cost;
        if let Some(declined) = self.check_energy(cost) {
            warn!("Recovery declined: {} energy needed", cost);
            return Ok(declined);
        }

        let residual =
            solver::recover_from_divergence(&mut self.run, self.config.tuning.recovery_penalty)?;
        self.researcher.energy -= cost;
        self.last_failure = None;
        self.push_log(format!("Manual recovery | Res: {:.4}", residual));
        info!("Run recovered at residual {:.4}", residual);
        Ok(Attempt::Done(residual))
    }

    /// Throw the current run away and start a fresh one.
    pub fn reset_run(&mut self) {
        solver::reset(&mut self.run, &self.config.tuning);
        self.last_failure = None;
        self.log.clear();
        self.push_log("Reset complete.".to_string());
        debug!("Run reset");
    }

    /// Harvest a converged run into a dataset and start a fresh run.
    pub fn extract_dataset(&mut self) -> Result<Dataset, LabError> {
        if self.phase() != RunPhase::Completed {
            return Err(LabError::RunNotComplete);
        }
        let dataset = research::extract_dataset(&mut self.rng);
        info!("Extracted dataset with quality {}", dataset.quality);
        self.researcher.datasets.push(dataset.clone());
        solver::reset(&mut self.run, &self.config.tuning);
        self.last_failure = None;
        Ok(dataset)
    }

    /// Go home. Energy is restored overnight.
    pub fn end_day(&mut self) {
        self.researcher.day += 1;
        self.researcher.energy = self.config.max_energy;
        debug!("Day {} begins", self.researcher.day);
    }

    // ── Papers & review ────────────────────────────────────────────────

    /// Bind three datasets (by index) into a draft, consuming them.
    pub fn draft_paper(&mut self, indices: &[usize]) -> Result<DraftPaper, LabError> {
        if self.draft.is_some() {
            return Err(LabError::DraftPending);
        }
        let count = self.researcher.datasets.len();
        let mut seen = Vec::with_capacity(indices.len());
        for &i in indices {
            if i >= count {
                return Err(LabError::NoSuchDataset(i));
            }
            if seen.contains(&i) {
                return Err(LabError::DuplicateDataset(i));
            }
            seen.push(i);
        }

        let selected: Vec<Dataset> = indices
            .iter()
            .map(|&i| self.researcher.datasets[i].clone())
            .collect();
        let draft = research::draft_paper(&selected)?;

        let mut index = 0;
        self.researcher.datasets.retain(|_| {
            let keep = !seen.contains(&index);
            index += 1;
            keep
        });
        self.draft = Some(draft);
        info!("Drafted paper with score {}", draft.score);
        Ok(draft)
    }

    /// Send the waiting draft to a journal and open the review.
    pub fn submit(&mut self, journal: Journal) -> Result<&ReviewBattle, LabError> {
        if self.battle.is_some() {
            return Err(LabError::ReviewInProgress);
        }
        let draft = self.draft.take().ok_or(LabError::NoDraft)?;
        info!("Submitted paper (score {}) to {}", draft.score, journal.name());
        Ok(self.battle.insert(ReviewBattle::start(journal, draft)))
    }

    /// Answer Reviewer #2. A decided review is closed and, if accepted,
    /// rewarded.
    pub fn review(&mut self, author_move: AuthorMove) -> Result<Attempt<TurnReport>, LabError> {
        let battle = self.battle.as_mut().ok_or(LabError::NoReview)?;

        let cost = author_move.funds_cost();
        if self.researcher.funds < cost {
            warn!("{:?} declined: {} funds needed", author_move, cost);
            return Ok(Attempt::Declined {
                resource: Resource::Funds,
                needed: cost,
                available: self.researcher.funds,
            });
        }

        let report = battle.play(author_move, &mut self.rng)?;
        self.researcher.funds -= cost;
        let journal = battle.journal;

        match report.verdict {
            Verdict::Pending => {}
            Verdict::Accepted => {
                self.researcher.reputation += ACCEPTANCE_REPUTATION;
                self.researcher.funds += ACCEPTANCE_FUNDS;
                self.battle = None;
                info!("Paper accepted by {}", journal.name());
            }
            Verdict::Rejected => {
                self.battle = None;
                info!("Paper rejected by {}", journal.name());
            }
        }
        Ok(Attempt::Done(report))
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn check_energy<T>(&self, cost: u32) -> Option<Attempt<T>> {
        if self.researcher.energy < cost {
            Some(Attempt::Declined {
                resource: Resource::Energy,
                needed: cost as i64,
                available: self.researcher.energy as i64,
            })
        } else {
            None
        }
    }

    /// Log one step. `iteration` counts residuals including the seed.
    fn record_outcome(&mut self, outcome: StepOutcome, iteration: usize, residual: f64) {
        match outcome {
            StepOutcome::Diverged => {
                let reason = FAILURE_REASONS[self.rng.pick(FAILURE_REASONS.len())];
                self.last_failure = Some(reason.to_string());
                self.push_log(format!("ERROR: {}", reason));
                info!("Run diverged at iteration {}: {}", iteration, reason);
            }
            StepOutcome::Running | StepOutcome::Completed => {
                self.push_log(format!("Iter: {} | Res: {:.4}", iteration, residual));
                debug!("Iter {} residual {:.4}", iteration, residual);
                if outcome == StepOutcome::Completed {
                    info!("Run converged after {} iterations", iteration);
                }
            }
        }
    }

    fn push_log(&mut self, msg: String) {
        self.log.push_front(format!("[{}] {}", self.researcher.day, msg));
        self.log.truncate(self.config.log_capacity);
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

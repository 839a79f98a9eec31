//! Integration tests for the solver run lifecycle.
//!
//! Exercises: risk model → step → recover / reset → batch, driven both by
//! scripted draws and by seeded ChaCha streams.

use cfdlab_logic::hardware::HardwareTier;
use cfdlab_logic::sampler::ScriptedDraws;
use cfdlab_logic::solver::{
    compute_divergence_risk, recover_from_divergence, reset, run_batch, step, step_with_risk,
    RiskModifiers, RunPhase, RunState, StepInputs, StepOutcome,
};
use cfdlab_logic::tuning::SolverTuning;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ── Helpers ────────────────────────────────────────────────────────────

fn modifiers() -> impl Strategy<Value = RiskModifiers> {
    (
        0.0f64..=1.0,
        0.0f64..0.5,
        0u32..12,
        0.0f64..=1.0,
        0.0f64..0.3,
    )
        .prop_map(
            |(mesh_quality, difficulty, feature_count, skill, equipment_discount)| RiskModifiers {
                mesh_quality,
                difficulty,
                feature_count,
                skill,
                equipment_discount,
            },
        )
}

// ── Risk properties ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn risk_always_inside_clamp(
        cfl in 0.01f64..10.0,
        relaxation in 0.01f64..=1.0,
        m in modifiers(),
    ) {
        let t = SolverTuning::default();
        let r = compute_divergence_risk(&StepInputs::new(cfl, relaxation).with_modifiers(m), &t);
        prop_assert!(!r.is_nan());
        prop_assert!(r >= t.risk_min && r <= t.risk_max);
    }

    #[test]
    fn risk_non_decreasing_in_cfl(
        a in 0.01f64..10.0,
        b in 0.01f64..10.0,
        relaxation in 0.01f64..=1.0,
        m in modifiers(),
    ) {
        let t = SolverTuning::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let r_lo = compute_divergence_risk(&StepInputs::new(lo, relaxation).with_modifiers(m), &t);
        let r_hi = compute_divergence_risk(&StepInputs::new(hi, relaxation).with_modifiers(m), &t);
        prop_assert!(r_lo <= r_hi);
    }

    #[test]
    fn risk_non_increasing_in_relaxation(
        cfl in 0.01f64..10.0,
        a in 0.01f64..=1.0,
        b in 0.01f64..=1.0,
        m in modifiers(),
    ) {
        let t = SolverTuning::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let r_lo = compute_divergence_risk(&StepInputs::new(cfl, lo).with_modifiers(m), &t);
        let r_hi = compute_divergence_risk(&StepInputs::new(cfl, hi).with_modifiers(m), &t);
        prop_assert!(r_hi <= r_lo);
    }

    #[test]
    fn surviving_residuals_respect_floor(
        seed in any::<u64>(),
        cfl in 0.1f64..=5.0,
        relaxation in 0.1f64..=1.0,
    ) {
        let t = SolverTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut state = RunState::new(&t);
        let inputs = StepInputs::new(cfl, relaxation);
        for _ in 0..300 {
            match step(&mut state, &inputs, &t, &mut rng).unwrap() {
                StepOutcome::Running => {
                    prop_assert!(state.last_residual() >= t.residual_floor);
                }
                StepOutcome::Diverged => {
                    prop_assert!(state.last_residual() >= 5.0);
                    recover_from_divergence(&mut state, t.recovery_penalty).unwrap();
                }
                StepOutcome::Completed => {
                    prop_assert!(state.last_residual() >= t.residual_floor);
                    reset(&mut state, &t);
                }
            }
        }
    }

    #[test]
    fn each_step_appends_exactly_one(seed in any::<u64>(), cfl in 0.1f64..=5.0) {
        let t = SolverTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut state = RunState::new(&t);
        let inputs = StepInputs::new(cfl, 0.7);
        while state.phase(&t) == RunPhase::Ready {
            let before_len = state.residuals().len();
            let before_progress = state.progress();
            let out = step(&mut state, &inputs, &t, &mut rng).unwrap();
            prop_assert_eq!(state.residuals().len(), before_len + 1);
            if out == StepOutcome::Diverged {
                prop_assert_eq!(state.progress(), before_progress);
            } else {
                prop_assert!(state.progress() > before_progress);
            }
        }
    }
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn scenario_a_slow_settings_are_safer() {
    let t = SolverTuning::default();
    let calm = compute_divergence_risk(&StepInputs::new(0.5, 0.7), &t);
    let fast = compute_divergence_risk(&StepInputs::new(5.0, 0.7), &t);
    assert!(calm < fast);
}

#[test]
fn scenario_b_zero_risk_completes_in_fifty_steps() {
    let t = SolverTuning::default();
    let mut state = RunState::new(&t);
    let inputs = StepInputs::new(1.0, 0.7);
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    let mut outcomes = Vec::new();
    for _ in 0..50 {
        let out = step_with_risk(&mut state, &inputs, 0.0, &t, &mut rng).unwrap();
        outcomes.push(out);
        if out == StepOutcome::Completed {
            break;
        }
    }

    assert_eq!(outcomes.last(), Some(&StepOutcome::Completed));
    assert!(!outcomes.contains(&StepOutcome::Diverged));
    assert!(state.progress() >= 100.0);
    assert_eq!(state.display_progress(&t), 100.0);
}

#[test]
fn scenario_c_low_draw_diverges_immediately() {
    let t = SolverTuning::default();
    let mut state = RunState::new(&t);
    let out = step(
        &mut state,
        &StepInputs::new(1.0, 0.7),
        &t,
        &mut ScriptedDraws::constant(0.0),
    )
    .unwrap();
    assert_eq!(out, StepOutcome::Diverged);
    assert!(state.is_diverged());
    assert_eq!(state.progress(), 0.0);
}

// ── Lifecycle ──────────────────────────────────────────────────────────

#[test]
fn diverge_recover_complete_cycle() {
    let t = SolverTuning::default();
    let mut state = RunState::new(&t);
    let inputs = StepInputs::new(2.5, 0.5).with_hardware(HardwareTier::Workstation);

    step(&mut state, &inputs, &t, &mut ScriptedDraws::constant(0.0)).unwrap();
    assert_eq!(state.phase(&t), RunPhase::Diverged);

    recover_from_divergence(&mut state, t.recovery_penalty).unwrap();
    assert_eq!(state.phase(&t), RunPhase::Ready);

    // 10 progress per step; never diverges at draw 0.999
    let report = run_batch(
        &mut state,
        &inputs,
        100,
        &t,
        &mut ScriptedDraws::constant(0.999),
    )
    .unwrap();
    assert_eq!(report.steps(), 10);
    assert_eq!(report.last_outcome(), Some(StepOutcome::Completed));
    assert_eq!(state.phase(&t), RunPhase::Completed);
    // seed + blow-up + recovery + 10 steps
    assert_eq!(state.residuals().len(), 13);
}

#[test]
fn batch_never_runs_past_terminal_outcome() {
    let t = SolverTuning::default();
    for seed in 0..50u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut state = RunState::new(&t);
        let report = run_batch(&mut state, &StepInputs::new(4.0, 0.3), 200, &t, &mut rng).unwrap();
        let terminal_at = report.outcomes.iter().position(|o| o.is_terminal());
        if let Some(i) = terminal_at {
            assert_eq!(i, report.steps() - 1, "seed {seed}");
        }
        assert_eq!(report.residuals.len(), report.steps());
        assert_eq!(state.residuals().len(), report.steps() + 1);
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let t = SolverTuning::default();
    let inputs = StepInputs::new(1.5, 0.6);
    let run = |seed| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut state = RunState::new(&t);
        run_batch(&mut state, &inputs, 60, &t, &mut rng).unwrap();
        state
    };
    assert_eq!(run(11), run(11));
}

//! Integration tests for a full research session.
//!
//! Exercises: solve → (recover) → extract ×3 → draft → submit → review,
//! plus save/load continuity. All sessions are seeded.

use cfdlab_core::prelude::*;

// ── Helpers ────────────────────────────────────────────────────────────

/// Drive the current run to convergence, recovering or sleeping as needed.
fn solve_one(lab: &mut Lab) -> usize {
    let mut guard = 0;
    while lab.phase() != RunPhase::Completed {
        guard += 1;
        assert!(guard < 10_000, "run never converged");
        match lab.phase() {
            RunPhase::Ready => {
                if lab.run_step().unwrap().is_declined() {
                    lab.end_day();
                }
            }
            RunPhase::Diverged => {
                if lab.recover().unwrap().is_declined() {
                    lab.end_day();
                }
            }
            RunPhase::Completed => {}
        }
    }
    guard
}

/// Session whose divergence probability is pinned to `risk`.
fn pinned_risk_lab(risk: f64, config: LabConfig, seed: u64) -> Lab {
    let mut config = config;
    config.tuning.risk_min = risk;
    config.tuning.risk_max = risk;
    Lab::with_config(config, seed).unwrap()
}

// ── Campaign ───────────────────────────────────────────────────────────

#[test]
fn full_campaign_reaches_acceptance() {
    let mut lab = Lab::new(1234);
    lab.set_knobs(1.0, 1.0);

    for _ in 0..3 {
        solve_one(&mut lab);
        let ds = lab.extract_dataset().unwrap();
        assert!((60..=100).contains(&ds.quality));
        assert_eq!(lab.phase(), RunPhase::Ready);
        assert_eq!(lab.run().residuals(), &[-1.0]);
    }
    assert_eq!(lab.researcher().datasets.len(), 3);

    let draft = lab.draft_paper(&[0, 1, 2]).unwrap();
    assert!(draft.score >= 180);
    assert!(lab.researcher().datasets.is_empty());

    lab.submit(Journal::OpenAccess).unwrap();
    assert!(lab.draft().is_none());

    let mut verdict = Verdict::Pending;
    for _ in 0..10 {
        let turn = lab.review(AuthorMove::CiteClassics).unwrap().done().unwrap();
        verdict = turn.verdict;
        if verdict != Verdict::Pending {
            break;
        }
    }
    // 180+ hit points against 50 resolve cannot lose to citations.
    assert_eq!(verdict, Verdict::Accepted);
    assert!(lab.battle().is_none());
    assert_eq!(lab.researcher().reputation, 50);
    assert_eq!(lab.researcher().funds, 55_000);
}

#[test]
fn divergence_is_logged_with_a_reason() {
    let mut lab = pinned_risk_lab(1.0, LabConfig::default(), 99);
    lab.set_knobs(5.0, 0.1);
    assert_eq!(lab.divergence_risk(), 1.0);

    let outcome = lab.run_step().unwrap().done().unwrap();
    assert_eq!(outcome, StepOutcome::Diverged);
    assert_eq!(lab.run().progress(), 0.0);
    assert_eq!(lab.run().last_residual(), 10.0);

    let reason = lab.last_failure().unwrap().to_string();
    assert!(FAILURE_REASONS.contains(&reason.as_str()));
    assert_eq!(lab.log().next(), Some(format!("[1] ERROR: {}", reason).as_str()));

    assert!(lab.run_step().is_err());
    let recovered = lab.recover().unwrap().done().unwrap();
    assert_eq!(recovered, 8.0);
    assert!(lab.last_failure().is_none());
    assert_eq!(lab.phase(), RunPhase::Ready);
}

#[test]
fn reckless_settings_hit_the_risk_ceiling() {
    let mut lab = Lab::new(99);
    lab.set_knobs(5.0, 0.1);
    lab.set_modifiers(RiskModifiers {
        mesh_quality: 0.0,
        difficulty: 0.5,
        ..RiskModifiers::default()
    })
    .unwrap();
    assert_eq!(lab.divergence_risk(), 0.99);
}

#[test]
fn auto_run_stops_at_terminal_outcome() {
    let mut lab = Lab::new(5);
    lab.set_hardware(HardwareTier::HpcCluster);
    lab.set_knobs(2.0, 0.9);
    let run = lab.auto_run(100).unwrap().done().unwrap();
    assert!(run.batch.last_outcome().unwrap().is_terminal());
    assert!(!run.budget_limited);
    // 20 progress per step
    assert!(run.batch.steps() <= 5);
    assert_eq!(lab.researcher().energy, 100 - run.batch.steps() as u32);
}

#[test]
fn auto_run_limited_by_energy() {
    let config = LabConfig {
        max_energy: 3,
        ..LabConfig::default()
    };
    let mut lab = pinned_risk_lab(0.0, config, 8);
    lab.set_knobs(0.1, 1.0);
    let run = lab.auto_run(10).unwrap().done().unwrap();
    assert_eq!(run.batch.steps(), 3);
    assert_eq!(run.batch.last_outcome(), Some(StepOutcome::Running));
    assert!(run.budget_limited);
    assert_eq!(lab.researcher().energy, 0);
    assert!(lab.auto_run(10).unwrap().is_declined());
}

#[test]
fn auto_run_log_matches_batch_residuals() {
    let mut lab = pinned_risk_lab(0.0, LabConfig::default(), 77);
    lab.set_knobs(1.0, 1.0);
    let run = lab.auto_run(5).unwrap().done().unwrap();
    assert_eq!(run.batch.steps(), 5);

    let mut logged: Vec<&str> = lab.log().take(5).collect();
    logged.reverse();
    for (i, (line, residual)) in logged.iter().zip(&run.batch.residuals).enumerate() {
        assert_eq!(*line, format!("[1] Iter: {} | Res: {:.4}", i + 2, residual));
    }
    let mut distinct = logged.clone();
    distinct.dedup();
    assert_eq!(distinct.len(), 5);
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn loaded_session_continues_identically() {
    let mut original = Lab::new(77);
    original.set_knobs(1.0, 1.0);
    original.auto_run(10).unwrap();

    let mut bytes = Vec::new();
    original.save(&mut bytes).unwrap();
    let mut loaded = Lab::load(bytes.as_slice()).unwrap();

    assert_eq!(loaded.run(), original.run());
    assert_eq!(loaded.researcher(), original.researcher());
    assert_eq!(loaded.seed(), 77);

    let a = original.auto_run(10).ok().and_then(Attempt::done);
    let b = loaded.auto_run(10).ok().and_then(Attempt::done);
    assert_eq!(a, b);
    assert_eq!(loaded.run(), original.run());
    assert_eq!(loaded.log().collect::<Vec<_>>(), original.log().collect::<Vec<_>>());
}

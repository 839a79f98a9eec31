//! Solver tuning constants and their validation.
//!
//! All coefficients of the divergence-risk model and the residual recurrence
//! live in one [`SolverTuning`] value. The defaults reproduce the laptop-era
//! solver console; alternative tunings can be loaded from JSON by the
//! session layer and must pass [`validate_tuning`] first.
//!
//! ```
//! use cfdlab_logic::tuning::{validate_tuning, SolverTuning};
//!
//! let tuning = SolverTuning::default();
//! assert!(validate_tuning(&tuning).is_empty());
//! assert_eq!(tuning.residual_floor, -9.0);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coefficients for risk, progress and residual updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverTuning {
    /// Multiplier on `cfl^cfl_exponent * (relaxation_ceiling - relaxation)`.
    pub base_risk: f64,
    /// Power applied to the CFL number (>= 1).
    pub cfl_exponent: f64,
    /// Relaxation value at which the stability term would vanish (> 1).
    pub relaxation_ceiling: f64,
    /// Added risk at mesh quality 0 (none at quality 1).
    pub mesh_penalty: f64,
    /// Added risk per extra model feature.
    pub feature_penalty: f64,
    /// Risk removed per unit of researcher skill.
    pub skill_mitigation: f64,
    /// Lower clamp on the divergence probability.
    pub risk_min: f64,
    /// Upper clamp on the divergence probability.
    pub risk_max: f64,
    /// Progress gained per unit CFL per unit hardware throughput.
    pub progress_per_cfl: f64,
    /// Progress at which a run counts as complete.
    pub completion_threshold: f64,
    /// First residual of every run.
    pub seed_residual: f64,
    /// Residual drop per step per unit relaxation (negative).
    pub drop_per_relaxation: f64,
    /// Noise amplitude per unit CFL.
    pub noise_per_cfl: f64,
    /// Floor for non-diverged residuals.
    pub residual_floor: f64,
    /// Residual appended on divergence.
    pub blowup_residual: f64,
    /// Residual markdown applied by a manual recovery.
    pub recovery_penalty: f64,
}

impl Default for SolverTuning {
    fn default() -> Self {
        Self {
            base_risk: 0.05,
            cfl_exponent: 2.0,
            relaxation_ceiling: 1.1,
            mesh_penalty: 0.2,
            feature_penalty: 0.03,
            skill_mitigation: 0.1,
            risk_min: 0.01,
            risk_max: 0.99,
            progress_per_cfl: 2.0,
            completion_threshold: 100.0,
            seed_residual: -1.0,
            drop_per_relaxation: -0.1,
            noise_per_cfl: 0.1,
            residual_floor: -9.0,
            blowup_residual: 10.0,
            recovery_penalty: 2.0,
        }
    }
}

/// Tuning validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TuningError {
    #[error("{field} must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },
    #[error("risk clamp [{min}, {max}] must be an ordered range inside [0, 1]")]
    RiskRange { min: f64, max: f64 },
    #[error("cfl_exponent must be at least 1 (got {0})")]
    CflExponent(f64),
    #[error("relaxation_ceiling must exceed 1 (got {0})")]
    RelaxationCeiling(f64),
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("progress_per_cfl must be positive (got {0})")]
    ProgressRate(f64),
    #[error("completion_threshold must be positive (got {0})")]
    CompletionThreshold(f64),
    #[error("drop_per_relaxation must be negative (got {0})")]
    DropDirection(f64),
    #[error("seed residual {seed} lies below the floor {floor}")]
    SeedBelowFloor { seed: f64, floor: f64 },
    #[error("blow-up residual {blowup} must sit above the seed residual {seed}")]
    BlowupTooLow { blowup: f64, seed: f64 },
}

/// Validate a tuning, returning all errors found.
pub fn validate_tuning(t: &SolverTuning) -> Vec<TuningError> {
    let mut errors = Vec::new();

    let fields = [
        ("base_risk", t.base_risk),
        ("cfl_exponent", t.cfl_exponent),
        ("relaxation_ceiling", t.relaxation_ceiling),
        ("mesh_penalty", t.mesh_penalty),
        ("feature_penalty", t.feature_penalty),
        ("skill_mitigation", t.skill_mitigation),
        ("risk_min", t.risk_min),
        ("risk_max", t.risk_max),
        ("progress_per_cfl", t.progress_per_cfl),
        ("completion_threshold", t.completion_threshold),
        ("seed_residual", t.seed_residual),
        ("drop_per_relaxation", t.drop_per_relaxation),
        ("noise_per_cfl", t.noise_per_cfl),
        ("residual_floor", t.residual_floor),
        ("blowup_residual", t.blowup_residual),
        ("recovery_penalty", t.recovery_penalty),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            errors.push(TuningError::NotFinite { field, value });
        }
    }
    if !errors.is_empty() {
        return errors;
    }

    if !(0.0 <= t.risk_min && t.risk_min <= t.risk_max && t.risk_max <= 1.0) {
        errors.push(TuningError::RiskRange {
            min: t.risk_min,
            max: t.risk_max,
        });
    }
    if t.cfl_exponent < 1.0 {
        errors.push(TuningError::CflExponent(t.cfl_exponent));
    }
    if t.relaxation_ceiling <= 1.0 {
        errors.push(TuningError::RelaxationCeiling(t.relaxation_ceiling));
    }
    for (field, value) in [
        ("base_risk", t.base_risk),
        ("mesh_penalty", t.mesh_penalty),
        ("feature_penalty", t.feature_penalty),
        ("skill_mitigation", t.skill_mitigation),
        ("noise_per_cfl", t.noise_per_cfl),
        ("recovery_penalty", t.recovery_penalty),
    ] {
        if value < 0.0 {
            errors.push(TuningError::Negative { field, value });
        }
    }
    if t.progress_per_cfl <= 0.0 {
        errors.push(TuningError::ProgressRate(t.progress_per_cfl));
    }
    if t.completion_threshold <= 0.0 {
        errors.push(TuningError::CompletionThreshold(t.completion_threshold));
    }
    if t.drop_per_relaxation >= 0.0 {
        errors.push(TuningError::DropDirection(t.drop_per_relaxation));
    }
    if t.seed_residual < t.residual_floor {
        errors.push(TuningError::SeedBelowFloor {
            seed: t.seed_residual,
            floor: t.residual_floor,
        });
    }
    if t.blowup_residual <= t.seed_residual {
        errors.push(TuningError::BlowupTooLow {
            blowup: t.blowup_residual,
            seed: t.seed_residual,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_valid() {
        assert!(validate_tuning(&SolverTuning::default()).is_empty());
    }

    #[test]
    fn inverted_risk_range_rejected() {
        let t = SolverTuning {
            risk_min: 0.5,
            risk_max: 0.2,
            ..SolverTuning::default()
        };
        assert!(validate_tuning(&t)
            .iter()
            .any(|e| matches!(e, TuningError::RiskRange { .. })));
    }

    #[test]
    fn risk_range_outside_unit_interval_rejected() {
        let t = SolverTuning {
            risk_max: 1.5,
            ..SolverTuning::default()
        };
        assert!(!validate_tuning(&t).is_empty());
    }

    #[test]
    fn sublinear_cfl_exponent_rejected() {
        let t = SolverTuning {
            cfl_exponent: 0.5,
            ..SolverTuning::default()
        };
        assert!(validate_tuning(&t).contains(&TuningError::CflExponent(0.5)));
    }

    #[test]
    fn positive_drop_rejected() {
        let t = SolverTuning {
            drop_per_relaxation: 0.1,
            ..SolverTuning::default()
        };
        assert!(validate_tuning(&t).contains(&TuningError::DropDirection(0.1)));
    }

    #[test]
    fn non_finite_short_circuits() {
        let t = SolverTuning {
            base_risk: f64::NAN,
            ..SolverTuning::default()
        };
        let errors = validate_tuning(&t);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            TuningError::NotFinite {
                field: "base_risk",
                ..
            }
        ));
    }

    #[test]
    fn blowup_must_exceed_seed() {
        let t = SolverTuning {
            blowup_residual: -2.0,
            ..SolverTuning::default()
        };
        assert!(validate_tuning(&t)
            .iter()
            .any(|e| matches!(e, TuningError::BlowupTooLow { .. })));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let t: SolverTuning = serde_json::from_str(r#"{"residual_floor": -6.0}"#).unwrap();
        assert_eq!(t.residual_floor, -6.0);
        assert_eq!(t.blowup_residual, 10.0);
    }
}

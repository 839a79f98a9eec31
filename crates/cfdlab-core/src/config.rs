//! Session configuration: starting resources, action costs, solver tuning.

use serde::{Deserialize, Serialize};

use cfdlab_logic::tuning::{validate_tuning, SolverTuning};

use crate::LabError;

/// Everything a lab session is parameterised by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub tuning: SolverTuning,
    pub starting_funds: i64,
    /// Energy cap, restored at the end of each day.
    pub max_energy: u32,
    pub step_energy_cost: u32,
    pub recover_energy_cost: u32,
    /// Solver log lines kept, newest first.
    pub log_capacity: usize,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            tuning: SolverTuning::default(),
            starting_funds: 50_000,
            max_energy: 100,
            step_energy_cost: 1,
            recover_energy_cost: 10,
            log_capacity: 50,
        }
    }
}

impl LabConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, LabError> {
        let config: LabConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LabError> {
        let errors = validate_tuning(&self.tuning);
        if !errors.is_empty() {
            return Err(LabError::InvalidTuning(errors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        assert_eq!(LabConfig::from_json("{}").unwrap(), LabConfig::default());
    }

    #[test]
    fn nested_tuning_override() {
        let json = r#"{"step_energy_cost": 3, "tuning": {"blowup_residual": 5.0}}"#;
        let c = LabConfig::from_json(json).unwrap();
        assert_eq!(c.step_energy_cost, 3);
        assert_eq!(c.tuning.blowup_residual, 5.0);
        assert_eq!(c.tuning.residual_floor, -9.0);
    }

    #[test]
    fn invalid_tuning_rejected() {
        let err = LabConfig::from_json(r#"{"tuning": {"risk_min": 0.9, "risk_max": 0.1}}"#)
            .unwrap_err();
        assert!(matches!(err, LabError::InvalidTuning(_)));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            LabConfig::from_json("{not json"),
            Err(LabError::ConfigParse(_))
        ));
    }
}

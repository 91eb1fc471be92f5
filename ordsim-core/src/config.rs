//! Simulation parameters, their defaults, and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when simulation parameters violate their documented bounds.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be in (0, 1] (got {value})")]
    AllocationRange { field: &'static str, value: f64 },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("missingness requires both {missing} and its counterpart")]
    IncompleteMissingness { missing: &'static str },
}

/// Validate a treatment allocation probability.
///
/// # Errors
///
/// Returns `ConfigError::AllocationRange` unless `0 < value <= 1`.
pub fn check_allocation_prob(value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::AllocationRange {
            field: "allocation_prob",
            value,
        })
    }
}

/// Validate a plain probability in `[0, 1]`.
///
/// # Errors
///
/// Returns `ConfigError::RangeViolation` when the value is outside `[0, 1]`
/// or not finite.
pub fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}

/// Post-discharge missingness probabilities. Neither has a default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissingnessConfig {
    pub prob_missing_given_alive: f64,
    pub prob_missing_given_dead: f64,
}

impl MissingnessConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if either probability is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("missingness.prob_missing_given_alive", self.prob_missing_given_alive)?;
        check_probability("missingness.prob_missing_given_dead", self.prob_missing_given_dead)
    }
}

/// Full parameter set for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_allocation_prob")]
    pub allocation_prob: f64,
    #[serde(default = "SimulationConfig::default_seed")]
    pub seed: u64,
    #[serde(default = "SimulationConfig::default_complete_follow_up")]
    pub complete_follow_up: bool,
    #[serde(default)]
    pub missingness: Option<MissingnessConfig>,
}

impl SimulationConfig {
    /// Null effect: both halves of every stratum treated with probability 0.5.
    #[must_use]
    pub const fn default_allocation_prob() -> f64 {
        0.5
    }

    #[must_use]
    pub const fn default_seed() -> u64 {
        1337
    }

    #[must_use]
    pub const fn default_complete_follow_up() -> bool {
        true
    }

    /// Parse a configuration from JSON, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_allocation_prob(self.allocation_prob)?;
        if let Some(missingness) = &self.missingness {
            missingness.validate()?;
        }
        Ok(())
    }

    /// Apply command-line style overrides on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::IncompleteMissingness` when the overlay names only
    /// one missingness probability and the base has no missingness section.
    pub fn with_overlay(&self, overlay: &SimulationConfigOverlay) -> Result<Self, ConfigError> {
        let missingness = match (
            overlay.prob_missing_given_alive,
            overlay.prob_missing_given_dead,
            self.missingness,
        ) {
            (None, None, base) => base,
            (Some(alive), Some(dead), _) => Some(MissingnessConfig {
                prob_missing_given_alive: alive,
                prob_missing_given_dead: dead,
            }),
            (Some(alive), None, Some(base)) => Some(MissingnessConfig {
                prob_missing_given_alive: alive,
                ..base
            }),
            (None, Some(dead), Some(base)) => Some(MissingnessConfig {
                prob_missing_given_dead: dead,
                ..base
            }),
            (Some(_), None, None) => {
                return Err(ConfigError::IncompleteMissingness {
                    missing: "prob_missing_given_dead",
                });
            }
            (None, Some(_), None) => {
                return Err(ConfigError::IncompleteMissingness {
                    missing: "prob_missing_given_alive",
                });
            }
        };
        Ok(Self {
            allocation_prob: overlay.allocation_prob.unwrap_or(self.allocation_prob),
            seed: overlay.seed.unwrap_or(self.seed),
            complete_follow_up: overlay
                .complete_follow_up
                .unwrap_or(self.complete_follow_up),
            missingness,
        })
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            allocation_prob: Self::default_allocation_prob(),
            seed: Self::default_seed(),
            complete_follow_up: Self::default_complete_follow_up(),
            missingness: None,
        }
    }
}

/// Optional overrides layered on a base configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfigOverlay {
    #[serde(default)]
    pub allocation_prob: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub complete_follow_up: Option<bool>,
    #[serde(default)]
    pub prob_missing_given_alive: Option<f64>,
    #[serde(default)]
    pub prob_missing_given_dead: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let cfg = SimulationConfig::from_json("{}").unwrap();
        assert_eq!(cfg, SimulationConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn allocation_prob_bounds() {
        assert!(check_allocation_prob(1.0).is_ok());
        assert!(check_allocation_prob(0.01).is_ok());
        assert!(check_allocation_prob(0.0).is_err());
        assert!(check_allocation_prob(1.2).is_err());
        assert!(check_allocation_prob(f64::NAN).is_err());
    }

    #[test]
    fn missingness_section_requires_both_probabilities() {
        let parsed = SimulationConfig::from_json(
            r#"{ "missingness": { "prob_missing_given_alive": 0.2 } }"#,
        );
        assert!(parsed.is_err());

        let cfg = SimulationConfig::from_json(
            r#"{
                "allocation_prob": 0.7,
                "missingness": { "prob_missing_given_alive": 0.2, "prob_missing_given_dead": 1.5 }
            }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::RangeViolation {
                field: "missingness.prob_missing_given_dead",
                min: 0.0,
                max: 1.0,
                value: 1.5,
            })
        );
    }

    #[test]
    fn overlay_replaces_only_given_fields() {
        let base = SimulationConfig {
            allocation_prob: 0.6,
            seed: 9,
            complete_follow_up: true,
            missingness: Some(MissingnessConfig {
                prob_missing_given_alive: 0.1,
                prob_missing_given_dead: 0.3,
            }),
        };
        let overlay = SimulationConfigOverlay {
            seed: Some(42),
            prob_missing_given_dead: Some(0.5),
            ..SimulationConfigOverlay::default()
        };
        let merged = base.with_overlay(&overlay).unwrap();
        assert_eq!(merged.seed, 42);
        assert!((merged.allocation_prob - 0.6).abs() < f64::EPSILON);
        let missingness = merged.missingness.unwrap();
        assert!((missingness.prob_missing_given_alive - 0.1).abs() < f64::EPSILON);
        assert!((missingness.prob_missing_given_dead - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn overlay_rejects_half_missingness_without_base() {
        let overlay = SimulationConfigOverlay {
            prob_missing_given_alive: Some(0.2),
            ..SimulationConfigOverlay::default()
        };
        assert_eq!(
            SimulationConfig::default().with_overlay(&overlay),
            Err(ConfigError::IncompleteMissingness {
                missing: "prob_missing_given_dead"
            })
        );
    }
}

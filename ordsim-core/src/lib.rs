//! Ordinal Trial Simulation Core
//!
//! Platform-agnostic transformations for longitudinal ordinal outcome data:
//! schema validation, trajectory scoring, stratified treatment reallocation,
//! follow-up completion, and informative missingness injection.
//! This crate performs no I/O; data enters through [`DataSource`].

pub mod config;
pub mod dataset;
pub mod followup;
pub mod missingness;
pub mod numbers;
pub mod outcome;
pub mod pipeline;
pub mod reallocate;
pub mod schema;
pub mod score;
pub mod seed;
pub mod source;
pub mod strata;
pub mod summary;

use thiserror::Error;

// Re-export commonly used types
pub use config::{ConfigError, MissingnessConfig, SimulationConfig, SimulationConfigOverlay};
pub use dataset::{Dataset, FOLLOW_UP_DAYS, ParticipantId, Record, TableSchema};
pub use followup::complete;
pub use missingness::inject_missing;
pub use outcome::{CANONICAL_LEVELS, Outcome, Treatment};
pub use pipeline::{RunError, Simulation, SimulationRun, simulate};
pub use reallocate::{ParticipantAllocation, ReallocationReport, reallocate, reallocate_with_report};
pub use schema::{SchemaError, validate};
pub use score::{OrdinalSum, Scores, TrajectoryScorer, ordinal_sum_scores};
pub use seed::{RngStreams, SimRng};
pub use source::{DataSource, InMemorySource, JsonSource, SourceError, to_json_string};
pub use strata::{QuartileCuts, Stratifier, StratumKey};
pub use summary::{
    ArmSummary, DailyOccupancy, HospitalFreeDays, TrialSummary, hospital_free_days, summarize,
};

/// Errors returned by the dataset transformations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("scorer produced no score for participant {id}")]
    MissingScore { id: ParticipantId },
}

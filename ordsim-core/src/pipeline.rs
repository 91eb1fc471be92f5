//! End-to-end simulation: load, reallocate, complete, then optionally inject
//! missingness.

use thiserror::Error;

use crate::SimError;
use crate::config::SimulationConfig;
use crate::dataset::Dataset;
use crate::followup::complete;
use crate::missingness::inject_missing;
use crate::reallocate::{ReallocationReport, reallocate_with_report};
use crate::schema::SchemaError;
use crate::score::{OrdinalSum, TrajectoryScorer};
use crate::seed::RngStreams;
use crate::source::DataSource;
use crate::summary::{TrialSummary, summarize};

/// Result of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    /// Transformed dataset.
    pub dataset: Dataset,
    pub reallocation: ReallocationReport,
    pub config: SimulationConfig,
    /// Observations turned missing by the injector; zero when it did not run.
    pub missing_injected: usize,
}

impl SimulationRun {
    /// Per-arm summary of the transformed dataset.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the dataset fails validation.
    pub fn summary(&self) -> Result<TrialSummary, SchemaError> {
        summarize(&self.dataset)
    }
}

/// Failure while running a [`Simulation`].
#[derive(Debug, Error)]
pub enum RunError<E>
where
    E: std::error::Error + 'static,
{
    #[error("failed to load dataset")]
    Source(#[source] E),
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Run every configured stage over an in-memory dataset.
///
/// # Errors
///
/// Returns `SimError::Config` if the configuration is invalid and any error
/// raised by the individual stages.
pub fn simulate<S>(
    dataset: &Dataset,
    config: &SimulationConfig,
    scorer: &S,
) -> Result<SimulationRun, SimError>
where
    S: TrajectoryScorer + ?Sized,
{
    config.validate()?;
    let streams = RngStreams::from_user_seed(config.seed);
    log::info!(
        "simulating {} rows (allocation_prob {}, seed {})",
        dataset.len(),
        config.allocation_prob,
        streams.seed()
    );

    let mut rng = streams.reallocation();
    let (mut dataset, reallocation) =
        reallocate_with_report(dataset, config.allocation_prob, scorer, &mut rng)?;

    if config.complete_follow_up {
        dataset = complete(&dataset)?;
        log::info!("completed follow-up: {} rows", dataset.len());
    }

    let mut missing_injected = 0;
    if let Some(missingness) = &config.missingness {
        let before = count_missing(&dataset);
        let mut rng = streams.missingness();
        dataset = inject_missing(
            &dataset,
            missingness.prob_missing_given_alive,
            missingness.prob_missing_given_dead,
            &mut rng,
        )?;
        missing_injected = count_missing(&dataset) - before;
        log::info!("injected {missing_injected} missing observations");
    }

    Ok(SimulationRun {
        dataset,
        reallocation,
        config: config.clone(),
        missing_injected,
    })
}

fn count_missing(dataset: &Dataset) -> usize {
    dataset.records().iter().filter(|r| r.y.is_none()).count()
}

/// Simulation engine bound to a data source and a scoring strategy.
pub struct Simulation<D, S = OrdinalSum>
where
    D: DataSource,
    S: TrajectoryScorer,
{
    source: D,
    scorer: S,
}

impl<D> Simulation<D, OrdinalSum>
where
    D: DataSource,
{
    /// Create an engine ranking participants by ordinal sum.
    pub const fn new(source: D) -> Self {
        Self {
            source,
            scorer: OrdinalSum,
        }
    }
}

impl<D, S> Simulation<D, S>
where
    D: DataSource,
    S: TrajectoryScorer,
{
    /// Create an engine with a caller-supplied scorer.
    pub const fn with_scorer(source: D, scorer: S) -> Self {
        Self { source, scorer }
    }

    /// Load the population from the source.
    ///
    /// # Errors
    ///
    /// Returns the source's error if loading fails.
    pub fn load(&self) -> Result<Dataset, D::Error> {
        self.source.load()
    }

    /// Load the population and run every configured stage.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Source` if loading fails and `RunError::Sim` for
    /// any configuration or transformation error.
    pub fn run(&self, config: &SimulationConfig) -> Result<SimulationRun, RunError<D::Error>> {
        let dataset = self.load().map_err(RunError::Source)?;
        Ok(simulate(&dataset, config, &self.scorer)?)
    }
}

//! Per-participant trajectory scores used to rank prognosis.

use std::collections::BTreeMap;

use crate::dataset::{Dataset, ParticipantId};
use crate::schema::{SchemaError, validate};

/// Integer score keyed by participant.
pub type Scores = BTreeMap<ParticipantId, i64>;

/// Strategy reducing each participant's trajectory to one integer.
///
/// Higher scores must mean a better course: the reallocator treats the top
/// half of each stratum as the better-prognosis half.
pub trait TrajectoryScorer {
    fn score(&self, dataset: &Dataset) -> Scores;
}

impl<F> TrajectoryScorer for F
where
    F: Fn(&Dataset) -> Scores,
{
    fn score(&self, dataset: &Dataset) -> Scores {
        self(dataset)
    }
}

/// Sum of ordinal codes (Dead=0 .. Home=3) over every observed day.
/// Missing days contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinalSum;

impl TrajectoryScorer for OrdinalSum {
    fn score(&self, dataset: &Dataset) -> Scores {
        let mut scores = Scores::new();
        for record in dataset.records() {
            let code = record.y.map_or(0, |y| i64::from(y.code()));
            *scores.entry(record.id).or_insert(0) += code;
        }
        scores
    }
}

/// Validate and score a dataset with the ordinal-sum rule.
///
/// # Errors
///
/// Returns `SchemaError` if the dataset fails validation.
pub fn ordinal_sum_scores(dataset: &Dataset) -> Result<Scores, SchemaError> {
    validate(dataset)?;
    Ok(OrdinalSum.score(dataset))
}

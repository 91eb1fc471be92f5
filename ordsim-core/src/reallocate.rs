//! Stratified, rank-based treatment reallocation.
//!
//! Participants are grouped by age × SOFA quartile strata, ranked by
//! trajectory score inside their stratum, and the better-prognosis half is
//! treated with probability `allocation_prob` while the other half is treated
//! with `1 - allocation_prob`. At 0.5 treatment is independent of prognosis;
//! towards 1 the treated arm is increasingly the better-prognosis half.

use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::SimError;
use crate::config::check_allocation_prob;
use crate::dataset::{Dataset, ParticipantId, Record};
use crate::numbers::ratio;
use crate::outcome::Treatment;
use crate::schema::validate;
use crate::score::TrajectoryScorer;
use crate::strata::{Stratifier, StratumKey};

/// Normalized rank at or above which a participant is in the upper half.
pub const UPPER_HALF_RANK: f64 = 0.5;

/// Per-participant record of how the new assignment was drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantAllocation {
    pub id: ParticipantId,
    pub stratum: StratumKey,
    pub score: i64,
    /// Rank by score within the stratum divided by stratum size, in (0, 1].
    pub normalized_rank: f64,
    pub treat_probability: f64,
    pub tx: Treatment,
}

/// Diagnostics describing one reallocation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReallocationReport {
    pub allocation_prob: f64,
    pub stratifier: Stratifier,
    /// One entry per participant, in baseline row order.
    pub participants: Vec<ParticipantAllocation>,
}

impl ReallocationReport {
    #[must_use]
    pub fn stratum_sizes(&self) -> BTreeMap<StratumKey, usize> {
        let mut sizes = BTreeMap::new();
        for participant in &self.participants {
            *sizes.entry(participant.stratum).or_insert(0) += 1;
        }
        sizes
    }

    #[must_use]
    pub fn treated_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.tx.is_treated())
            .count()
    }

    #[must_use]
    pub fn assignment(&self) -> HashMap<ParticipantId, Treatment> {
        self.participants.iter().map(|p| (p.id, p.tx)).collect()
    }
}

/// Probability of treatment for a given normalized rank.
#[must_use]
pub fn treat_probability(normalized_rank: f64, allocation_prob: f64) -> f64 {
    if normalized_rank >= UPPER_HALF_RANK {
        allocation_prob
    } else {
        1.0 - allocation_prob
    }
}

/// Reassign `tx` for every participant.
///
/// # Errors
///
/// Returns `SimError::Config` for an `allocation_prob` outside `(0, 1]`,
/// `SimError::Schema` if the dataset fails validation, and
/// `SimError::MissingScore` if the scorer omits a participant.
pub fn reallocate<S, R>(
    dataset: &Dataset,
    allocation_prob: f64,
    scorer: &S,
    rng: &mut R,
) -> Result<Dataset, SimError>
where
    S: TrajectoryScorer + ?Sized,
    R: Rng + ?Sized,
{
    reallocate_with_report(dataset, allocation_prob, scorer, rng).map(|(data, _)| data)
}

/// Reassign `tx` and return the per-participant allocation diagnostics.
///
/// # Errors
///
/// Same as [`reallocate`].
pub fn reallocate_with_report<S, R>(
    dataset: &Dataset,
    allocation_prob: f64,
    scorer: &S,
    rng: &mut R,
) -> Result<(Dataset, ReallocationReport), SimError>
where
    S: TrajectoryScorer + ?Sized,
    R: Rng + ?Sized,
{
    check_allocation_prob(allocation_prob)?;
    validate(dataset)?;

    let baseline = dataset.baseline_rows();
    let scores = scorer.score(dataset);
    let scored = baseline
        .into_iter()
        .map(|record| {
            scores
                .get(&record.id)
                .map(|score| (record, *score))
                .ok_or(SimError::MissingScore { id: record.id })
        })
        .collect::<Result<Vec<(&Record, i64)>, SimError>>()?;

    let covariates: Vec<(f64, f64)> = scored.iter().map(|(r, _)| (r.age, r.sofa)).collect();
    let stratifier = Stratifier::fit(&covariates);
    let keys: Vec<StratumKey> = scored
        .iter()
        .map(|(r, _)| stratifier.stratum(r.age, r.sofa))
        .collect();
    let ranks = normalized_ranks(&scored, &keys);

    let mut participants = Vec::with_capacity(scored.len());
    for (idx, (record, score)) in scored.iter().enumerate() {
        let probability = treat_probability(ranks[idx], allocation_prob);
        let tx = Treatment::from_flag(rng.gen_bool(probability));
        participants.push(ParticipantAllocation {
            id: record.id,
            stratum: keys[idx],
            score: *score,
            normalized_rank: ranks[idx],
            treat_probability: probability,
            tx,
        });
    }

    let report = ReallocationReport {
        allocation_prob,
        stratifier,
        participants,
    };
    log::debug!(
        "reallocated {} participants across {} strata ({} treated, allocation_prob {})",
        report.participants.len(),
        report.stratum_sizes().len(),
        report.treated_count(),
        allocation_prob
    );

    let assignment = report.assignment();
    let records = dataset
        .records()
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if let Some(tx) = assignment.get(&record.id) {
                record.tx = *tx;
            }
            record
        })
        .collect();
    Ok((dataset.derive(records), report))
}

/// Normalized within-stratum ranks, indexed like `scored`. Ranks ascend by
/// score; ties keep row order.
fn normalized_ranks(scored: &[(&Record, i64)], keys: &[StratumKey]) -> Vec<f64> {
    let mut strata: BTreeMap<StratumKey, Vec<usize>> = BTreeMap::new();
    for (idx, key) in keys.iter().enumerate() {
        strata.entry(*key).or_default().push(idx);
    }

    let mut ranks = vec![0.0; scored.len()];
    for (key, members) in &mut strata {
        members.sort_by_key(|&idx| scored[idx].1);
        let size = members.len();
        for (position, &idx) in members.iter().enumerate() {
            ranks[idx] = ratio(position + 1, size);
        }
        log::trace!("stratum {key:?}: {size} participants");
    }
    ranks
}

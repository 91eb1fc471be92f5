//! Outcome-dependent missingness after hospital discharge.
//!
//! The probability model is supplied by the caller: one probability for
//! participants alive at the end of follow-up and one for those who died.
//! The motivating relation is
//! `P(discharged | missing) = P(missing | discharged) * P(discharged) / P(missing)`,
//! so survival-dependent dropout after discharge biases any analysis that
//! ignores it.

use rand::Rng;
use std::collections::HashSet;

use crate::SimError;
use crate::config::check_probability;
use crate::dataset::{Dataset, ParticipantId, Record};
use crate::outcome::Outcome;
use crate::schema::validate;

/// Day of first discharge home, if any. Rows must be sorted by day.
#[must_use]
pub fn first_discharge_day(rows: &[&Record]) -> Option<u8> {
    rows.iter()
        .find(|r| r.y == Some(Outcome::Home))
        .map(|r| r.time)
}

/// Whether the participant is dead by the end of follow-up. Dead is
/// absorbing, so any Dead day counts.
#[must_use]
pub fn dead_by_end(rows: &[&Record]) -> bool {
    rows.iter().any(|r| r.is_dead())
}

/// Turn post-discharge observations missing.
///
/// For each participant discharged home at least once, every day strictly
/// after the first discharge day independently becomes missing with
/// `prob_missing_given_dead` if the participant dies during follow-up, or
/// `prob_missing_given_alive` otherwise. The day after a missing day loses
/// its `yprev`. Draws run over participants by ascending id, then days.
///
/// # Errors
///
/// Returns `SimError::Config` for probabilities outside `[0, 1]` and
/// `SimError::Schema` if the dataset fails validation.
pub fn inject_missing<R>(
    dataset: &Dataset,
    prob_missing_given_alive: f64,
    prob_missing_given_dead: f64,
    rng: &mut R,
) -> Result<Dataset, SimError>
where
    R: Rng + ?Sized,
{
    check_probability("prob_missing_given_alive", prob_missing_given_alive)?;
    check_probability("prob_missing_given_dead", prob_missing_given_dead)?;
    validate(dataset)?;

    let mut missing: HashSet<(ParticipantId, u8)> = HashSet::new();
    let mut discharged = 0usize;
    for (id, rows) in dataset.trajectories() {
        let Some(discharge_day) = first_discharge_day(&rows) else {
            continue;
        };
        discharged += 1;
        let probability = if dead_by_end(&rows) {
            prob_missing_given_dead
        } else {
            prob_missing_given_alive
        };
        for record in rows.iter().filter(|r| r.time > discharge_day) {
            if rng.gen_bool(probability) {
                missing.insert((id, record.time));
            }
        }
    }

    log::debug!(
        "missingness: {} of {} participants discharged, {} observations set missing",
        discharged,
        dataset.participant_ids().len(),
        missing.len()
    );

    let records = dataset
        .records()
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if missing.contains(&(record.id, record.time)) {
                record.y = None;
            }
            if record.time > 1 && missing.contains(&(record.id, record.time - 1)) {
                record.yprev = None;
            }
            record
        })
        .collect();
    Ok(dataset.derive(records))
}

//! Fixed-length follow-up reconstruction.
//!
//! Every participant is expanded to one row per day over the follow-up
//! window. Days with no input row are assumed Dead (both `y` and `yprev`);
//! this holds even when the last observed day was not Dead.

use std::collections::{BTreeMap, HashMap};

use crate::SimError;
use crate::dataset::{Dataset, FOLLOW_UP_DAYS, ParticipantId, Record};
use crate::outcome::{Outcome, Treatment};
use crate::schema::validate;

/// Covariates held constant over follow-up, taken from the baseline row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    age: f64,
    sofa: f64,
    tx: Treatment,
    gap: Option<f64>,
}

impl From<&Record> for Baseline {
    fn from(record: &Record) -> Self {
        Self {
            age: record.age,
            sofa: record.sofa,
            tx: record.tx,
            gap: record.gap,
        }
    }
}

/// Expand every participant to exactly one row per day `1..=28`, sorted by
/// `(id, time)`.
///
/// # Errors
///
/// Returns `SimError::Schema` if the dataset fails validation.
pub fn complete(dataset: &Dataset) -> Result<Dataset, SimError> {
    validate(dataset)?;

    let baselines: BTreeMap<ParticipantId, Baseline> = dataset
        .baseline_index()
        .into_iter()
        .map(|(id, record)| (id, Baseline::from(record)))
        .collect();
    let observed: HashMap<(ParticipantId, u8), (Option<Outcome>, Option<Outcome>)> = dataset
        .records()
        .iter()
        .map(|r| ((r.id, r.time), (r.y, r.yprev)))
        .collect();

    let mut records = Vec::with_capacity(baselines.len() * usize::from(FOLLOW_UP_DAYS));
    let mut filled = 0usize;
    for (id, baseline) in &baselines {
        for time in 1..=FOLLOW_UP_DAYS {
            let (y, yprev) = observed.get(&(*id, time)).copied().unwrap_or_else(|| {
                filled += 1;
                (Some(Outcome::Dead), Some(Outcome::Dead))
            });
            records.push(Record {
                id: *id,
                time,
                y,
                yprev,
                age: baseline.age,
                sofa: baseline.sofa,
                tx: baseline.tx,
                gap: baseline.gap,
            });
        }
    }

    log::debug!(
        "completed follow-up for {} participants ({} rows, {filled} filled as Dead)",
        baselines.len(),
        records.len()
    );
    Ok(dataset.derive(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u32, time: u8, y: Outcome, yprev: Option<Outcome>) -> Record {
        Record {
            id: ParticipantId(id),
            time,
            y: Some(y),
            yprev,
            age: 70.0,
            sofa: 6.0,
            tx: Treatment::Treatment,
            gap: Some(1.0),
        }
    }

    fn died_on_day_ten() -> Vec<Record> {
        let mut rows: Vec<Record> = (1..10)
            .map(|t| row(1, t, Outcome::VentArds, Some(Outcome::VentArds)))
            .collect();
        rows.push(row(1, 10, Outcome::Dead, Some(Outcome::VentArds)));
        rows
    }

    #[test]
    fn fills_days_after_death() {
        let out = complete(&Dataset::from_records(died_on_day_ten())).unwrap();
        assert_eq!(out.len(), 28);
        let times: Vec<u8> = out.records().iter().map(|r| r.time).collect();
        assert_eq!(times, (1..=28).collect::<Vec<u8>>());
        for record in out.records().iter().filter(|r| r.time > 10) {
            assert_eq!(record.y, Some(Outcome::Dead));
            assert_eq!(record.yprev, Some(Outcome::Dead));
        }
        assert_eq!(out.records()[9].yprev, Some(Outcome::VentArds));
    }

    #[test]
    fn carries_baseline_covariates() {
        let mut rows = died_on_day_ten();
        rows[4].sofa = 11.0;
        rows[4].tx = Treatment::Control;
        let out = complete(&Dataset::from_records(rows)).unwrap();
        assert!(out.records().iter().all(|r| (r.sofa - 6.0).abs() < f64::EPSILON));
        assert!(out.records().iter().all(|r| r.tx == Treatment::Treatment));
        assert!(out.records().iter().all(|r| r.gap == Some(1.0)));
    }

    #[test]
    fn censored_alive_is_still_filled_dead() {
        let rows = vec![
            row(2, 1, Outcome::InHospital, None),
            row(2, 2, Outcome::Home, Some(Outcome::InHospital)),
        ];
        let out = complete(&Dataset::from_records(rows)).unwrap();
        assert_eq!(out.records()[2].y, Some(Outcome::Dead));
    }

    #[test]
    fn mid_trajectory_gap_is_filled_dead() {
        let rows = vec![
            row(3, 1, Outcome::InHospital, None),
            row(3, 2, Outcome::InHospital, Some(Outcome::InHospital)),
            row(3, 5, Outcome::Home, Some(Outcome::InHospital)),
        ];
        let out = complete(&Dataset::from_records(rows)).unwrap();
        assert_eq!(out.len(), 28);
        for day in [3, 4] {
            let record = &out.records()[usize::from(day) - 1];
            assert_eq!(record.time, day);
            assert_eq!(record.y, Some(Outcome::Dead));
            assert_eq!(record.yprev, Some(Outcome::Dead));
        }
        let day_five = &out.records()[4];
        assert_eq!(day_five.y, Some(Outcome::Home));
        assert_eq!(day_five.yprev, Some(Outcome::InHospital));
    }

    #[test]
    fn output_is_sorted_by_id_then_day() {
        let rows = vec![
            row(9, 1, Outcome::Home, None),
            row(4, 2, Outcome::Home, Some(Outcome::Home)),
            row(4, 1, Outcome::Home, None),
        ];
        let out = complete(&Dataset::from_records(rows)).unwrap();
        assert_eq!(out.len(), 56);
        assert!(
            out.records()
                .windows(2)
                .all(|w| (w[0].id, w[0].time) < (w[1].id, w[1].time))
        );
    }

    #[test]
    fn is_idempotent() {
        let once = complete(&Dataset::from_records(died_on_day_ten())).unwrap();
        let twice = complete(&once).unwrap();
        assert_eq!(once, twice);
    }
}

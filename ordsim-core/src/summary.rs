//! Reporting-side summaries consumed by external renderers.
//!
//! The hospital-free-days rule here is a reporting score and is distinct
//! from [`crate::score::OrdinalSum`], which drives reallocation.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::dataset::{Dataset, Record};
use crate::missingness::{dead_by_end, first_discharge_day};
use crate::numbers::{i64_to_f64, ratio, usize_to_f64};
use crate::outcome::{LEVEL_COUNT, Outcome, Treatment};
use crate::schema::{SchemaError, validate};
use crate::score::{Scores, TrajectoryScorer};

/// Sentinel hospital-free-days value for participants who died.
pub const DEATH_SENTINEL: i64 = -1;

/// Hospital-free days: -1 if the participant was ever Dead, otherwise the
/// number of days spent Home.
#[must_use]
pub fn hospital_free_days(rows: &[&Record]) -> i64 {
    if dead_by_end(rows) {
        return DEATH_SENTINEL;
    }
    let home_days = rows.iter().filter(|r| r.y == Some(Outcome::Home)).count();
    i64::try_from(home_days).unwrap_or(i64::MAX)
}

/// Scorer form of [`hospital_free_days`], for callers who explicitly want to
/// rank on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HospitalFreeDays;

impl TrajectoryScorer for HospitalFreeDays {
    fn score(&self, dataset: &Dataset) -> Scores {
        dataset
            .trajectories()
            .into_iter()
            .map(|(id, rows)| (id, hospital_free_days(&rows)))
            .collect()
    }
}

/// Whether the participant was discharged home and later died.
#[must_use]
pub fn died_after_discharge(rows: &[&Record]) -> bool {
    first_discharge_day(rows).is_some_and(|day| {
        rows.iter()
            .any(|r| r.time > day && r.y == Some(Outcome::Dead))
    })
}

/// Outcome aggregates for one treatment arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmSummary {
    pub tx: Treatment,
    pub participants: usize,
    pub deaths: usize,
    pub mortality: f64,
    pub discharged: usize,
    pub died_after_discharge: usize,
    /// Mean hospital-free days over survivors; zero when none survived.
    pub mean_hospital_free_days: f64,
}

/// Counts of each level (plus missing) on one day within one arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyOccupancy {
    pub tx: Treatment,
    pub time: u8,
    /// Indexed by ordinal code.
    pub counts: [usize; LEVEL_COUNT],
    pub missing: usize,
}

impl DailyOccupancy {
    #[must_use]
    pub fn observed(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Share of observed participants in `level` on this day.
    #[must_use]
    pub fn proportion(&self, level: Outcome) -> f64 {
        ratio(self.counts[usize::from(level.code())], self.observed())
    }
}

/// Per-arm aggregates and the daily state-occupancy table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialSummary {
    pub participants: usize,
    pub rows: usize,
    pub arms: Vec<ArmSummary>,
    pub occupancy: Vec<DailyOccupancy>,
}

impl TrialSummary {
    #[must_use]
    pub fn arm(&self, tx: Treatment) -> Option<&ArmSummary> {
        self.arms.iter().find(|arm| arm.tx == tx)
    }
}

#[derive(Default)]
struct ArmAccumulator {
    participants: usize,
    deaths: usize,
    discharged: usize,
    died_after_discharge: usize,
    survivor_hfd_total: i64,
}

/// Summarize a dataset per treatment arm.
///
/// # Errors
///
/// Returns `SchemaError` if the dataset fails validation.
pub fn summarize(dataset: &Dataset) -> Result<TrialSummary, SchemaError> {
    validate(dataset)?;

    let baselines = dataset.baseline_index();
    let trajectories = dataset.trajectories();
    let mut arms: BTreeMap<Treatment, ArmAccumulator> = BTreeMap::new();
    for (id, rows) in &trajectories {
        let Some(baseline) = baselines.get(id) else {
            continue;
        };
        let arm = arms.entry(baseline.tx).or_default();
        arm.participants += 1;
        if first_discharge_day(rows).is_some() {
            arm.discharged += 1;
        }
        if died_after_discharge(rows) {
            arm.died_after_discharge += 1;
        }
        let hfd = hospital_free_days(rows);
        if hfd == DEATH_SENTINEL {
            arm.deaths += 1;
        } else {
            arm.survivor_hfd_total += hfd;
        }
    }

    let arms = arms
        .into_iter()
        .map(|(tx, acc)| {
            let survivors = acc.participants - acc.deaths;
            let mean_hospital_free_days = if survivors == 0 {
                0.0
            } else {
                i64_to_f64(acc.survivor_hfd_total) / usize_to_f64(survivors)
            };
            ArmSummary {
                tx,
                participants: acc.participants,
                deaths: acc.deaths,
                mortality: ratio(acc.deaths, acc.participants),
                discharged: acc.discharged,
                died_after_discharge: acc.died_after_discharge,
                mean_hospital_free_days,
            }
        })
        .collect();

    Ok(TrialSummary {
        participants: trajectories.len(),
        rows: dataset.len(),
        arms,
        occupancy: occupancy(dataset),
    })
}

fn occupancy(dataset: &Dataset) -> Vec<DailyOccupancy> {
    let mut table: BTreeMap<(Treatment, u8), DailyOccupancy> = BTreeMap::new();
    for record in dataset.records() {
        let cell = table
            .entry((record.tx, record.time))
            .or_insert_with(|| DailyOccupancy {
                tx: record.tx,
                time: record.time,
                counts: [0; LEVEL_COUNT],
                missing: 0,
            });
        match record.y {
            Some(y) => cell.counts[usize::from(y.code())] += 1,
            None => cell.missing += 1,
        }
    }
    table.into_values().collect()
}

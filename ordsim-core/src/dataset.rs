//! Participant-day records and the dataset container.
//!
//! A [`Dataset`] is row-per-participant-day. Joins between per-participant
//! values and rows always go through an id-keyed index rather than
//! positional column replacement.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::outcome::{CANONICAL_LEVELS, Outcome, Treatment};

/// Length of the follow-up window in days.
pub const FOLLOW_UP_DAYS: u8 = 28;

/// Columns every dataset must declare.
pub const REQUIRED_COLUMNS: [&str; 6] = ["id", "time", "y", "age", "sofa", "tx"];

/// Columns known to the record model, in canonical order.
pub const KNOWN_COLUMNS: [&str; 8] = ["id", "time", "y", "yprev", "age", "sofa", "tx", "gap"];

/// Stable participant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant-day observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: ParticipantId,
    /// Day index, 1-based.
    pub time: u8,
    /// Outcome for the day; `None` marks a missing observation.
    pub y: Option<Outcome>,
    /// Outcome on the previous day; `None` when unobserved.
    pub yprev: Option<Outcome>,
    pub age: f64,
    pub sofa: f64,
    pub tx: Treatment,
    #[serde(default)]
    pub gap: Option<f64>,
}

impl Record {
    #[must_use]
    pub const fn is_baseline(&self) -> bool {
        self.time == 1
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.y.is_some_and(Outcome::is_dead)
    }
}

/// Declared shape of a table: its column names and the level order of the
/// outcome factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<String>,
    pub outcome_levels: Vec<String>,
}

impl TableSchema {
    /// Schema carrying every known column and the canonical level order.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            columns: KNOWN_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            outcome_levels: canonical_levels(),
        }
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Canonical outcome levels as owned strings.
#[must_use]
pub fn canonical_levels() -> Vec<String> {
    CANONICAL_LEVELS.iter().map(|l| (*l).to_string()).collect()
}

/// Ordered collection of participant-day records plus its declared schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    schema: TableSchema,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset with the canonical schema.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            schema: TableSchema::canonical(),
            records,
        }
    }

    /// Build a dataset with an explicitly declared schema.
    #[must_use]
    pub const fn with_schema(schema: TableSchema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// New dataset sharing this dataset's schema.
    #[must_use]
    pub fn derive(&self, records: Vec<Record>) -> Self {
        Self {
            schema: self.schema.clone(),
            records,
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct participant ids in first-appearance order.
    #[must_use]
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.id))
            .map(|r| r.id)
            .collect()
    }

    /// First `time == 1` row of each participant, in row order.
    #[must_use]
    pub fn baseline_rows(&self) -> Vec<&Record> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| r.is_baseline() && seen.insert(r.id))
            .collect()
    }

    /// Baseline rows indexed by participant.
    #[must_use]
    pub fn baseline_index(&self) -> HashMap<ParticipantId, &Record> {
        let mut index = HashMap::new();
        for record in self.records.iter().filter(|r| r.is_baseline()) {
            index.entry(record.id).or_insert(record);
        }
        index
    }

    /// Rows grouped by participant, each group sorted by day.
    #[must_use]
    pub fn trajectories(&self) -> BTreeMap<ParticipantId, Vec<&Record>> {
        let mut groups: BTreeMap<ParticipantId, Vec<&Record>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.id).or_default().push(record);
        }
        for rows in groups.values_mut() {
            rows.sort_by_key(|r| r.time);
        }
        groups
    }

    /// Sort rows by `(id, time)` ascending.
    pub fn sort(&mut self) {
        self.records.sort_by_key(|r| (r.id, r.time));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u32, time: u8, y: Outcome) -> Record {
        Record {
            id: ParticipantId(id),
            time,
            y: Some(y),
            yprev: None,
            age: 50.0,
            sofa: 3.0,
            tx: Treatment::Control,
            gap: None,
        }
    }

    #[test]
    fn baseline_rows_follow_row_order() {
        let data = Dataset::from_records(vec![
            row(7, 2, Outcome::Home),
            row(3, 1, Outcome::VentArds),
            row(7, 1, Outcome::InHospital),
            row(3, 2, Outcome::Home),
        ]);
        let ids: Vec<u32> = data.baseline_rows().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 7]);
        let first_seen: Vec<u32> = data.participant_ids().iter().map(|id| id.0).collect();
        assert_eq!(first_seen, vec![7, 3]);
    }

    #[test]
    fn trajectories_are_day_sorted() {
        let data = Dataset::from_records(vec![
            row(1, 3, Outcome::Home),
            row(1, 1, Outcome::VentArds),
            row(1, 2, Outcome::InHospital),
        ]);
        let groups = data.trajectories();
        let days: Vec<u8> = groups[&ParticipantId(1)].iter().map(|r| r.time).collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn canonical_schema_covers_required_columns() {
        let schema = TableSchema::canonical();
        assert!(REQUIRED_COLUMNS.iter().all(|c| schema.has_column(c)));
        assert_eq!(schema.outcome_levels, canonical_levels());
    }
}

//! Shape and factor-level contract enforced before any transformation.

use std::collections::HashSet;
use thiserror::Error;

use crate::dataset::{Dataset, FOLLOW_UP_DAYS, ParticipantId, REQUIRED_COLUMNS, TableSchema};
use crate::outcome::CANONICAL_LEVELS;

/// Raised when a dataset does not conform to the longitudinal schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("input is not tabular: {0}")]
    NotTabular(String),
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("outcome levels {found:?} do not match the canonical order {expected:?}")]
    LevelMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("row {row}: unknown outcome level `{value}` in `{field}`")]
    UnknownLevel {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: field `{field}` has invalid value {value}")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("participant {id}: covariate `{field}` is missing or non-finite")]
    MissingCovariate {
        id: ParticipantId,
        field: &'static str,
    },
    #[error("participant {id}: day {time} outside follow-up window 1..={max}")]
    DayOutOfRange {
        id: ParticipantId,
        time: u8,
        max: u8,
    },
    #[error("participant {id}: day {time} appears more than once")]
    DuplicateDay { id: ParticipantId, time: u8 },
    #[error("participant {0} has no baseline (time == 1) row")]
    MissingBaseline(ParticipantId),
    #[error("dataset has no rows")]
    Empty,
}

/// Validate a dataset against the longitudinal schema.
///
/// # Errors
///
/// Returns the first `SchemaError` found: missing declared columns, a
/// non-canonical outcome level order, non-finite covariates, days outside the
/// follow-up window, duplicate participant-days, or a participant without a
/// baseline row.
pub fn validate(dataset: &Dataset) -> Result<(), SchemaError> {
    check_table_schema(dataset.schema())?;
    validate_rows(dataset)
}

/// Check declared columns and outcome level order without looking at rows.
///
/// # Errors
///
/// Returns `SchemaError::MissingField` or `SchemaError::LevelMismatch`.
pub fn check_table_schema(schema: &TableSchema) -> Result<(), SchemaError> {
    check_columns(schema)?;
    check_levels(schema)
}

fn check_columns(schema: &TableSchema) -> Result<(), SchemaError> {
    for column in REQUIRED_COLUMNS {
        if !schema.has_column(column) {
            return Err(SchemaError::MissingField(column));
        }
    }
    Ok(())
}

fn check_levels(schema: &TableSchema) -> Result<(), SchemaError> {
    let found = &schema.outcome_levels;
    let matches = found.len() == CANONICAL_LEVELS.len()
        && found.iter().zip(CANONICAL_LEVELS).all(|(a, b)| a == b);
    if matches {
        Ok(())
    } else {
        Err(SchemaError::LevelMismatch {
            expected: CANONICAL_LEVELS.iter().map(|l| (*l).to_string()).collect(),
            found: found.clone(),
        })
    }
}

fn validate_rows(dataset: &Dataset) -> Result<(), SchemaError> {
    if dataset.is_empty() {
        return Err(SchemaError::Empty);
    }

    let mut seen_days: HashSet<(ParticipantId, u8)> = HashSet::with_capacity(dataset.len());
    let mut with_baseline: HashSet<ParticipantId> = HashSet::new();
    for record in dataset.records() {
        if !record.age.is_finite() {
            return Err(SchemaError::MissingCovariate {
                id: record.id,
                field: "age",
            });
        }
        if !record.sofa.is_finite() {
            return Err(SchemaError::MissingCovariate {
                id: record.id,
                field: "sofa",
            });
        }
        if !(1..=FOLLOW_UP_DAYS).contains(&record.time) {
            return Err(SchemaError::DayOutOfRange {
                id: record.id,
                time: record.time,
                max: FOLLOW_UP_DAYS,
            });
        }
        if !seen_days.insert((record.id, record.time)) {
            return Err(SchemaError::DuplicateDay {
                id: record.id,
                time: record.time,
            });
        }
        if record.is_baseline() {
            with_baseline.insert(record.id);
        }
    }

    if let Some(id) = dataset
        .participant_ids()
        .into_iter()
        .find(|id| !with_baseline.contains(id))
    {
        return Err(SchemaError::MissingBaseline(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use crate::outcome::{Outcome, Treatment};

    fn row(id: u32, time: u8) -> Record {
        Record {
            id: ParticipantId(id),
            time,
            y: Some(Outcome::InHospital),
            yprev: None,
            age: 61.0,
            sofa: 4.0,
            tx: Treatment::Control,
            gap: None,
        }
    }

    fn sample() -> Vec<Record> {
        vec![row(1, 1), row(1, 2), row(2, 1)]
    }

    #[test]
    fn accepts_canonical_dataset() {
        assert_eq!(validate(&Dataset::from_records(sample())), Ok(()));
    }

    #[test]
    fn rejects_each_missing_required_field() {
        for missing in REQUIRED_COLUMNS {
            let mut schema = TableSchema::canonical();
            schema.columns.retain(|c| c != missing);
            let data = Dataset::with_schema(schema, sample());
            assert_eq!(validate(&data), Err(SchemaError::MissingField(missing)));
        }
    }

    #[test]
    fn rejects_reordered_levels() {
        let mut schema = TableSchema::canonical();
        schema.outcome_levels.swap(0, 3);
        let data = Dataset::with_schema(schema, sample());
        assert!(matches!(
            validate(&data),
            Err(SchemaError::LevelMismatch { .. })
        ));
    }

    #[test]
    fn rejects_extra_or_missing_levels() {
        let mut schema = TableSchema::canonical();
        schema.outcome_levels.push("Hospice".to_string());
        let data = Dataset::with_schema(schema.clone(), sample());
        assert!(matches!(
            validate(&data),
            Err(SchemaError::LevelMismatch { .. })
        ));

        schema.outcome_levels.truncate(3);
        let data = Dataset::with_schema(schema, sample());
        assert!(matches!(
            validate(&data),
            Err(SchemaError::LevelMismatch { .. })
        ));
    }

    #[test]
    fn rejects_missing_covariates() {
        let mut rows = sample();
        rows[2].sofa = f64::NAN;
        assert_eq!(
            validate(&Dataset::from_records(rows)),
            Err(SchemaError::MissingCovariate {
                id: ParticipantId(2),
                field: "sofa"
            })
        );
    }

    #[test]
    fn rejects_out_of_window_and_duplicate_days() {
        let mut rows = sample();
        rows.push(row(2, 29));
        assert!(matches!(
            validate(&Dataset::from_records(rows)),
            Err(SchemaError::DayOutOfRange { time: 29, .. })
        ));

        let mut rows = sample();
        rows.push(row(1, 2));
        assert_eq!(
            validate(&Dataset::from_records(rows)),
            Err(SchemaError::DuplicateDay {
                id: ParticipantId(1),
                time: 2
            })
        );
    }

    #[test]
    fn rejects_participant_without_baseline() {
        let mut rows = sample();
        rows.push(row(3, 2));
        assert_eq!(
            validate(&Dataset::from_records(rows)),
            Err(SchemaError::MissingBaseline(ParticipantId(3)))
        );
    }

    #[test]
    fn rejects_empty_dataset() {
        assert_eq!(
            validate(&Dataset::from_records(Vec::new())),
            Err(SchemaError::Empty)
        );
    }
}

//! Data provisioning seam and the JSON interchange format.
//!
//! A JSON dataset is either an array of row objects or an object of the form
//! `{ "outcome_levels": [...], "rows": [...] }`. Columns are the keys shared
//! by every row.

use serde::Serialize;
use serde_json::{Map, Value};
use std::convert::Infallible;
use thiserror::Error;

use crate::dataset::{Dataset, KNOWN_COLUMNS, ParticipantId, Record, TableSchema, canonical_levels};

const OPTIONAL_COLUMNS: [&str; 2] = ["yprev", "gap"];
use crate::outcome::{Outcome, Treatment};
use crate::schema::{SchemaError, check_table_schema, validate};

/// Trait for abstracting where a population dataset comes from.
/// Platform-specific implementations should provide this.
pub trait DataSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the population dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be loaded or does not conform to
    /// the schema.
    fn load(&self) -> Result<Dataset, Self::Error>;
}

/// Source serving an already-built dataset.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    dataset: Dataset,
}

impl InMemorySource {
    #[must_use]
    pub const fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }
}

impl DataSource for InMemorySource {
    type Error = Infallible;

    fn load(&self) -> Result<Dataset, Self::Error> {
        Ok(self.dataset.clone())
    }
}

/// Errors from reading the JSON interchange format.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Source parsing the JSON interchange format from text.
#[derive(Debug, Clone)]
pub struct JsonSource {
    text: String,
}

impl JsonSource {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl DataSource for JsonSource {
    type Error = SourceError;

    fn load(&self) -> Result<Dataset, Self::Error> {
        let value: Value = serde_json::from_str(&self.text)?;
        Ok(dataset_from_value(&value)?)
    }
}

/// Build and validate a dataset from a parsed JSON document.
///
/// # Errors
///
/// Returns `SchemaError::NotTabular` for documents that are not a list of
/// row objects, and any other `SchemaError` the rows violate.
pub fn dataset_from_value(value: &Value) -> Result<Dataset, SchemaError> {
    let (levels, rows) = match value {
        Value::Array(rows) => (canonical_levels(), rows),
        Value::Object(doc) => {
            let Some(Value::Array(rows)) = doc.get("rows") else {
                return Err(SchemaError::NotTabular(
                    "object document has no `rows` array".to_string(),
                ));
            };
            let levels = match doc.get("outcome_levels") {
                None => canonical_levels(),
                Some(levels) => parse_levels(levels)?,
            };
            (levels, rows)
        }
        other => {
            return Err(SchemaError::NotTabular(format!(
                "expected an array of rows, found {}",
                kind_name(other)
            )));
        }
    };

    let objects = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            row.as_object().ok_or_else(|| {
                SchemaError::NotTabular(format!("row {idx} is {}, not an object", kind_name(row)))
            })
        })
        .collect::<Result<Vec<&Map<String, Value>>, SchemaError>>()?;

    let schema = TableSchema {
        columns: shared_columns(&objects),
        outcome_levels: levels,
    };
    check_table_schema(&schema)?;

    let records = objects
        .iter()
        .enumerate()
        .map(|(idx, row)| parse_record(idx, row))
        .collect::<Result<Vec<Record>, SchemaError>>()?;

    let dataset = Dataset::with_schema(schema, records);
    validate(&dataset)?;
    Ok(dataset)
}

#[derive(Serialize)]
struct DatasetDocument<'a> {
    outcome_levels: &'a [String],
    rows: &'a [Record],
}

/// Serialize a dataset to the object form of the interchange format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&DatasetDocument {
        outcome_levels: &dataset.schema().outcome_levels,
        rows: dataset.records(),
    })
}

fn parse_levels(value: &Value) -> Result<Vec<String>, SchemaError> {
    let Value::Array(items) = value else {
        return Err(SchemaError::NotTabular(
            "`outcome_levels` must be an array of strings".to_string(),
        ));
    };
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                SchemaError::NotTabular("`outcome_levels` must be an array of strings".to_string())
            })
        })
        .collect()
}

/// Keys present in every row, known columns first in canonical order.
/// Optional columns count as declared when any row carries them.
fn shared_columns(rows: &[&Map<String, Value>]) -> Vec<String> {
    let Some((first, rest)) = rows.split_first() else {
        return KNOWN_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    };
    let mut columns: Vec<String> = KNOWN_COLUMNS
        .iter()
        .filter(|c| first.contains_key(**c))
        .map(|c| (*c).to_string())
        .collect();
    columns.extend(
        first
            .keys()
            .filter(|k| !KNOWN_COLUMNS.contains(&k.as_str()))
            .cloned(),
    );
    columns.retain(|c| rest.iter().all(|row| row.contains_key(c)));
    for optional in OPTIONAL_COLUMNS {
        let declared = columns.iter().any(|c| c == optional);
        if !declared && rows.iter().any(|row| row.contains_key(optional)) {
            columns.push(optional.to_string());
        }
    }
    columns
}

static NULL: Value = Value::Null;

fn field<'a>(row: &'a Map<String, Value>, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&NULL)
}

/// Optional keys are read per row; a row without one gets `None`.
fn parse_record(idx: usize, row: &Map<String, Value>) -> Result<Record, SchemaError> {
    let id = parse_integer(idx, "id", field(row, "id"))?;
    let time = parse_integer(idx, "time", field(row, "time"))?;
    Ok(Record {
        id: ParticipantId(u32::try_from(id).map_err(|_| invalid(idx, "id", field(row, "id")))?),
        time: u8::try_from(time).map_err(|_| invalid(idx, "time", field(row, "time")))?,
        y: parse_outcome(idx, "y", field(row, "y"))?,
        yprev: parse_outcome(idx, "yprev", field(row, "yprev"))?,
        age: parse_covariate(idx, "age", field(row, "age"))?,
        sofa: parse_covariate(idx, "sofa", field(row, "sofa"))?,
        tx: parse_treatment(idx, field(row, "tx"))?,
        gap: parse_optional_number(idx, "gap", field(row, "gap"))?,
    })
}

fn invalid(row: usize, field: &'static str, value: &Value) -> SchemaError {
    SchemaError::InvalidValue {
        row,
        field,
        value: value.to_string(),
    }
}

fn parse_integer(row: usize, field: &'static str, value: &Value) -> Result<u64, SchemaError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
            num_traits::cast::<f64, u64>(f).ok_or_else(|| invalid(row, field, value))
        }
        _ => Err(invalid(row, field, value)),
    }
}

fn parse_outcome(
    row: usize,
    field: &'static str,
    value: &Value,
) -> Result<Option<Outcome>, SchemaError> {
    match value {
        Value::Null => Ok(None),
        Value::String(label) => Outcome::from_label(label)
            .map(Some)
            .ok_or_else(|| SchemaError::UnknownLevel {
                row,
                field,
                value: label.clone(),
            }),
        Value::Number(_) => {
            let code = parse_integer(row, field, value)?;
            u8::try_from(code)
                .ok()
                .and_then(Outcome::from_code)
                .map(Some)
                .ok_or_else(|| SchemaError::UnknownLevel {
                    row,
                    field,
                    value: value.to_string(),
                })
        }
        other => Err(invalid(row, field, other)),
    }
}

/// Null covariates parse as NaN so validation reports them per participant.
fn parse_covariate(row: usize, field: &'static str, value: &Value) -> Result<f64, SchemaError> {
    match value {
        Value::Null => Ok(f64::NAN),
        other => other.as_f64().ok_or_else(|| invalid(row, field, other)),
    }
}

fn parse_optional_number(
    row: usize,
    field: &'static str,
    value: &Value,
) -> Result<Option<f64>, SchemaError> {
    match value {
        Value::Null => Ok(None),
        other => other
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(row, field, other)),
    }
}

fn parse_treatment(row: usize, value: &Value) -> Result<Treatment, SchemaError> {
    let treated = match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(_) => match parse_integer(row, "tx", value) {
            Ok(0) => Some(false),
            Ok(1) => Some(true),
            _ => None,
        },
        Value::String(label) => match label.trim().to_ascii_lowercase().as_str() {
            "0" | "control" => Some(false),
            "1" | "treatment" => Some(true),
            _ => None,
        },
        _ => None,
    };
    treated
        .map(Treatment::from_flag)
        .ok_or_else(|| invalid(row, "tx", value))
}

const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Cleaning rules for raw goal rows
//!
//! A row is dropped if any column is NULL, and discarded if its realized
//! value is not positive. Surviving rows have `mes` and `vendedor_id`
//! coerced to integers; a value that cannot be coerced aborts the run.
//! `valor_meta` is carried along as a number when it reads as one and is
//! never fatal.

use rusqlite::types::Value;
use thiserror::Error;

use super::extract::RawGoalRow;
use crate::types::TrainingRecord;

#[derive(Debug, Error, PartialEq)]
pub enum CleanError {
    #[error("row {row}: column {column} holds {value}, which is not an integer")]
    NotInteger {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("row {row}: column {column} holds {value}, which is not a number")]
    NotNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Result of cleaning, with counts of what was dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedData {
    pub records: Vec<TrainingRecord>,
    /// Rows with at least one NULL column
    pub dropped_missing: usize,
    /// Rows with a realized value `<= 0`
    pub dropped_non_positive: usize,
}

impl CleanedData {
    pub fn dropped(&self) -> usize {
        self.dropped_missing + self.dropped_non_positive
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s),
        Value::Blob(b) => format!("<{} byte blob>", b.len()),
    }
}

fn as_number(row: usize, column: &'static str, value: &Value) -> Result<f64, CleanError> {
    let parsed = match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(f) => Some(*f),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Blob(_) => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| CleanError::NotNumber { row, column, value: describe(value) })
}

/// Integers pass, reals are truncated toward zero, text must hold an integer
fn as_integer(row: usize, column: &'static str, value: &Value) -> Result<i64, CleanError> {
    let parsed = match value {
        Value::Integer(i) => Some(*i),
        Value::Real(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CleanError::NotInteger { row, column, value: describe(value) })
}

/// Apply the cleaning rules to extracted rows, preserving their order
pub fn clean(rows: &[RawGoalRow]) -> Result<CleanedData, CleanError> {
    let mut cleaned = CleanedData::default();

    for (idx, raw) in rows.iter().enumerate() {
        let columns = [&raw.vendedor_id, &raw.mes, &raw.valor_meta, &raw.valor_realizado];
        if columns.iter().any(|v| matches!(v, Value::Null)) {
            cleaned.dropped_missing += 1;
            continue;
        }

        let realized = as_number(idx, "valor_realizado", &raw.valor_realizado)?;
        if realized <= 0.0 {
            cleaned.dropped_non_positive += 1;
            continue;
        }

        cleaned.records.push(TrainingRecord {
            vendor_id: as_integer(idx, "vendedor_id", &raw.vendedor_id)?,
            month: as_integer(idx, "mes", &raw.mes)?,
            target_value: realized,
            planned_value: as_number(idx, "valor_meta", &raw.valor_meta).ok(),
        });
    }

    Ok(cleaned)
}

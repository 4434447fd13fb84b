use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{LeaderboardError, Result};

/// Column holding the nickname.
pub const NAME_COLUMN: &str = "name";

/// Column holding the derived total.
pub const TOTAL_COLUMN: &str = "total";

/// One sheet row keyed by header name.
pub type Record = BTreeMap<String, Value>;

/// Returns the column name for question `index` (0-based), i.e. `q1` for 0.
pub fn question_column(index: usize) -> String {
    format!("q{}", index + 1)
}

/// Builds the canonical header: `name, total, q1..qN`.
pub fn header(question_count: usize) -> Vec<String> {
    let mut columns = Vec::with_capacity(question_count + 2);
    columns.push(NAME_COLUMN.to_string());
    columns.push(TOTAL_COLUMN.to_string());
    columns.extend((0..question_count).map(question_column));
    columns
}

/// Exact sum of `scores`, or `None` if it does not fit in an `i64`.
pub fn checked_total(scores: &[i64]) -> Option<i64> {
    let sum: i128 = scores.iter().map(|&s| i128::from(s)).sum();
    i64::try_from(sum).ok()
}

/// A participant's scores as written to the sheet.
///
/// `total` is never stored on the struct; it is recomputed from `scores`
/// every time a row is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    pub name: String,
    pub scores: Vec<i64>,
}

impl ScoreRecord {
    pub fn new(name: impl Into<String>, scores: Vec<i64>) -> Self {
        ScoreRecord {
            name: name.into(),
            scores,
        }
    }

    /// Sum of the scores, clamped to the `i64` range.
    ///
    /// Sessions refuse edits whose total would not fit, so the clamp only
    /// applies to records built by hand.
    pub fn total(&self) -> i64 {
        checked_total(&self.scores).unwrap_or_else(|| {
            let sum: i128 = self.scores.iter().map(|&s| i128::from(s)).sum();
            if sum > 0 { i64::MAX } else { i64::MIN }
        })
    }

    /// Converts the record to its column mapping.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(NAME_COLUMN.to_string(), Value::String(self.name.clone()));
        record.insert(TOTAL_COLUMN.to_string(), Value::from(self.total()));
        for (i, score) in self.scores.iter().enumerate() {
            record.insert(question_column(i), Value::from(*score));
        }
        record
    }

    /// Reads `q1..qN` out of a sheet record.
    ///
    /// # Errors
    /// * `MalformedRow` if any question column is missing or not an integer,
    ///   or the scores add up to more than an `i64` holds
    pub fn from_record(record: &Record, question_count: usize) -> Result<Self> {
        let name = cell_text(record.get(NAME_COLUMN));
        let mut scores = Vec::with_capacity(question_count);
        for i in 0..question_count {
            let column = question_column(i);
            let score = record
                .get(&column)
                .and_then(cell_integer)
                .ok_or_else(|| LeaderboardError::MalformedRow {
                    name: name.clone(),
                    reason: format!("column {} is missing or not an integer", column),
                })?;
            scores.push(score);
        }
        if checked_total(&scores).is_none() {
            return Err(LeaderboardError::MalformedRow {
                name,
                reason: "scores overflow the total".to_string(),
            });
        }
        Ok(ScoreRecord { name, scores })
    }
}

/// Lays `record` out in `header` order; missing columns become empty cells.
pub fn to_row(record: &Record, header: &[String]) -> Vec<Value> {
    header
        .iter()
        .map(|column| {
            record
                .get(column)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()))
        })
        .collect()
}

/// Renders a cell as text. Numeric nicknames come back from the sheet as
/// numbers, so they are printed rather than dropped.
pub fn cell_text(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Parses a cell as an integer. Accepts whole floats (`3.0`) and numeric
/// strings, since sheets store every number as a double.
pub fn cell_integer(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// One row of a [`LeaderboardSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub name: String,
    /// Total as stored in the sheet, which may have been edited by hand.
    pub total: i64,
    pub record: Record,
}

/// The whole sheet at one point in time, in sheet row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl LeaderboardSnapshot {
    /// Builds a snapshot from sheet records.
    ///
    /// Rows without a nickname are skipped. A total that is not an integer
    /// counts as 0.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let name = cell_text(record.get(NAME_COLUMN));
            if name.is_empty() {
                log::debug!("skipping sheet row without a name");
                continue;
            }
            let total = match record.get(TOTAL_COLUMN).and_then(cell_integer) {
                Some(total) => total,
                None => {
                    log::warn!("row {:?} has a non-integer total, ranking it as 0", name);
                    0
                }
            };
            entries.push(SnapshotEntry {
                name,
                total,
                record,
            });
        }
        LeaderboardSnapshot { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// First entry whose name matches exactly (case-sensitive).
    pub fn find(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

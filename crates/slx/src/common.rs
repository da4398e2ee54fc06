//! 📦 Common data structures, the building blocks of sluice.
//!
//! 🎬 COLD OPEN. INT. BUCKET. 3:47 AM.
//!
//! A CSV lands. Nobody is awake. The header line says `model,year,price`.
//! Five rows follow, each one a tiny hope. Two of them are about to fail.
//! They do not know this yet. The `ProcessingResult` does. It always knows.
//!
//! These are the postal workers of the codebase: `Row` carries a record,
//! `ProcessingResult` carries the tally, `RelocationOutcome` carries the
//! receipt for the move. Please tip your postal workers. 🦆

use std::fmt;

use serde::Serialize;

use crate::zones::ObjectLocation;

/// 📄 One decoded CSV record, keyed by column name, in header order.
///
/// Inserting a column that already exists overwrites the value in place.
/// The column keeps its original position. Last writer wins, first writer
/// keeps the seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

/// 📊 The tally. Successes, failures, and the rows that failed, in input order.
///
/// Invariant: `success_count + failure_count` equals the number of rows read.
/// The only way in is `record_success` / `record_failure`, so the books balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub failed_rows: Vec<Row>,
}

impl ProcessingResult {
    pub(crate) fn record_success(&mut self) {
        self.success_count += 1;
    }

    /// 💀 Count the failure and keep the row exactly as it came in.
    pub(crate) fn record_failure(&mut self, row: Row) {
        self.failure_count += 1;
        self.failed_rows.push(row);
    }

    pub fn total_rows(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_rows.is_empty()
    }
}

/// 🧾 Receipt for a copy-then-delete move.
///
/// `completed` flips to true only after BOTH calls succeed. An incomplete
/// outcome travels inside `PipelineError::Relocation` so callers can see
/// exactly which half of the move happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationOutcome {
    pub source: ObjectLocation,
    pub destination: ObjectLocation,
    pub completed: bool,
}

impl fmt::Display for RelocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

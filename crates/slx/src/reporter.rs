//! 📝 Error reporter: the rows that failed, written back as a CSV side-report.
//!
//! `pending/cars.csv` with failures → `errors/cars_errors.csv`, content type
//! `text/csv`. The header is the union of every column seen across the failed
//! rows, in first-seen order. A row that lacks a column gets an empty cell.
//! Values are written back exactly as they were read.

use anyhow::{Context, anyhow};
use tracing::info;

use crate::backends::{ObjectStore, StorageBackend};
use crate::common::Row;
use crate::error::PipelineError;
use crate::zones::{ObjectLocation, Zone};

pub const REPORT_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    storage: StorageBackend,
}

impl ErrorReporter {
    pub fn new(storage: StorageBackend) -> Self {
        Self { storage }
    }

    /// 📍 `pending/cars.csv` → `errors/cars_errors.csv`.
    pub fn report_location_for(source: &ObjectLocation) -> ObjectLocation {
        source.relocated_to(Zone::Errors)
    }

    /// 📝 Serialize and write the side-report. One `put`, nothing else.
    ///
    /// Callers only invoke this with at least one failed row. Given zero it
    /// writes an empty object: no header, no rows, zero bytes.
    pub async fn report(&self, source: &ObjectLocation, failed_rows: &[Row]) -> Result<ObjectLocation, PipelineError> {
        let the_report_location = Self::report_location_for(source);
        let the_body = render_csv(failed_rows).map_err(|cause| self.fail(source, &the_report_location, cause))?;
        let the_bytes = the_body.len();

        self.storage
            .put(&the_report_location, the_body, REPORT_CONTENT_TYPE)
            .await
            .map_err(|cause| self.fail(source, &the_report_location, cause))?;

        info!(
            "📝 wrote {} failed rows ({} bytes) to {}",
            failed_rows.len(),
            the_bytes,
            the_report_location
        );
        Ok(the_report_location)
    }

    fn fail(&self, source: &ObjectLocation, report_location: &ObjectLocation, cause: anyhow::Error) -> PipelineError {
        PipelineError::Report {
            location: source.clone(),
            report_location: report_location.clone(),
            source: cause,
        }
    }
}

/// 🖨️ Rows → CSV bytes, header first.
pub fn render_csv(rows: &[Row]) -> anyhow::Result<Vec<u8>> {
    let mut the_columns: Vec<&str> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !the_columns.contains(&column) {
                the_columns.push(column);
            }
        }
    }

    // 🕳️ no columns means no header and nothing to put under it
    if the_columns.is_empty() {
        return Ok(Vec::new());
    }

    let mut the_writer = csv::Writer::from_writer(Vec::new());
    the_writer
        .write_record(&the_columns)
        .context("💀 writing the report header failed")?;
    for (index, row) in rows.iter().enumerate() {
        the_writer
            .write_record(the_columns.iter().map(|column| row.get(column).unwrap_or_default()))
            .context(format!("💀 writing failed row {} into the report failed", index))?;
    }

    the_writer
        .into_inner()
        .map_err(|err| anyhow!("💀 flushing the report buffer failed: {}", err.error()))
}

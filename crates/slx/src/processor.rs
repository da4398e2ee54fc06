//! 🔄 Row processor: pull a row, judge it, write it down, repeat.
//!
//! The processor owns no I/O. It takes any stream of rows, runs the injected
//! [`RowRule`] on each one in order, and keeps the tally. A row that fails the
//! rule is data, not an error. A row that can't even be *read* is an error, and
//! the whole run stops right there.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::common::{ProcessingResult, Row};
use crate::error::PipelineError;
use crate::rules::RowRule;

/// 🔄 Runs a rule over a row sequence.
#[derive(Clone)]
pub struct RowProcessor {
    rule: Arc<dyn RowRule>,
}

impl std::fmt::Debug for RowProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowProcessor").finish_non_exhaustive()
    }
}

impl RowProcessor {
    pub fn new(rule: Arc<dyn RowRule>) -> Self {
        Self { rule }
    }

    /// 🏃 Consume the stream to the end.
    ///
    /// Rows are pulled one at a time, so memory stays at one row plus whatever
    /// failed. The first `Err` from the stream aborts the run and is returned as is.
    pub async fn run<S>(&self, rows: S) -> Result<ProcessingResult, PipelineError>
    where
        S: Stream<Item = Result<Row, PipelineError>>,
    {
        let mut the_rows = std::pin::pin!(rows);
        let mut the_result = ProcessingResult::default();
        let mut the_index = 0usize;

        while let Some(next) = the_rows.next().await {
            let the_row = next?;
            match self.rule.apply(&the_row) {
                Ok(()) => the_result.record_success(),
                Err(why) => {
                    // 🔢 rows are numbered from 1 in the logs
                    warn!("⚠️ row {} failed the rule: {:#}", the_index + 1, why);
                    the_result.record_failure(the_row);
                }
            }
            the_index += 1;
            if the_index % 10_000 == 0 {
                debug!("🔄 {} rows judged so far", the_index);
            }
        }

        info!(
            "📊 processed {} rows: {} ok, {} failed",
            the_result.total_rows(),
            the_result.success_count,
            the_result.failure_count
        );
        Ok(the_result)
    }
}

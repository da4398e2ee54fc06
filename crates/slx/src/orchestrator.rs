//! 🎬 Orchestrator: one notification in, one run out.
//!
//! ```text
//!   event ──▶ filter ──no──▶ Skipped (zero storage calls)
//!               │yes
//!               ▼
//!   RowSource::open (1 get) ──▶ RowProcessor::run ──▶ Relocator::relocate
//!                                                        │
//!                              failures? ──yes──▶ ErrorReporter::report
//!                                                        │
//!                                                        ▼
//!                                                Completed(RunSummary)
//! ```
//!
//! 🧠 Knowledge graph:
//! - Sequential, no retries, no parallel rows. One event, one object.
//! - Relocation happens even when every single row failed. The object was
//!   processed; it just processed badly.
//! - A read failure stops the run before any mutation.
//! - A report failure happens AFTER relocation, which is not undone.
//! - Two events for the same key racing each other are not guarded against.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::backends::StorageBackend;
use crate::common::{ProcessingResult, RelocationOutcome};
use crate::error::PipelineError;
use crate::event_filter::{self, NotificationEvent};
use crate::processor::RowProcessor;
use crate::relocator::Relocator;
use crate::reporter::ErrorReporter;
use crate::row_source::RowSource;
use crate::rules::RowRule;
use crate::zones::ObjectLocation;

/// 🧾 What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub source: ObjectLocation,
    pub success_count: usize,
    pub failure_count: usize,
    pub relocation: RelocationOutcome,
    /// 📝 Only present when at least one row failed.
    pub report: Option<ObjectLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HandleOutcome {
    /// 🚪 Not our kind of event. Nothing was touched.
    Skipped,
    Completed(RunSummary),
}

/// 🎬 Wires the pieces together for one event at a time.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    storage: StorageBackend,
    processor: RowProcessor,
    relocator: Relocator,
    reporter: ErrorReporter,
}

impl Orchestrator {
    pub fn new(storage: StorageBackend, rule: Arc<dyn RowRule>) -> Self {
        Self {
            processor: RowProcessor::new(rule),
            relocator: Relocator::new(storage.clone()),
            reporter: ErrorReporter::new(storage.clone()),
            storage,
        }
    }

    /// 📨 Raw JSON entry point. A payload that doesn't even parse as a
    /// notification is skipped, same as any other ineligible event.
    pub async fn handle_payload(&self, payload: &serde_json::Value) -> Result<HandleOutcome, PipelineError> {
        match event_filter::parse_event(payload) {
            Some(the_event) => self.handle(&the_event).await,
            None => {
                info!("🚪 payload is not a storage notification, skipping");
                Ok(HandleOutcome::Skipped)
            }
        }
    }

    /// 🎬 Run the whole pipeline for one notification.
    pub async fn handle(&self, event: &NotificationEvent) -> Result<HandleOutcome, PipelineError> {
        if !event_filter::is_eligible(event) {
            info!("🚪 event is not a direct write into pending, skipping");
            return Ok(HandleOutcome::Skipped);
        }

        let the_location = self.resolve(event)?;
        info!("🎬 processing {}", the_location);

        let the_result = self.read_and_judge(&the_location).await?;

        let the_relocation = self.relocator.relocate(&the_location).await?;

        let the_report = if the_result.has_failures() {
            match self
                .reporter
                .report(&the_relocation.source, &the_result.failed_rows)
                .await
            {
                Ok(location) => Some(location),
                Err(err) => {
                    error!(
                        "💀 {} was relocated but its error report could not be written; \
                         {} failed rows are only in the logs now",
                        the_relocation, the_result.failure_count
                    );
                    return Err(err);
                }
            }
        } else {
            None
        };

        if the_result.success_count == 0 && the_result.failure_count > 0 {
            warn!(
                "⚠️ every row in {} failed and it was moved to done anyway",
                the_location
            );
        }

        Ok(HandleOutcome::Completed(RunSummary {
            source: the_location,
            success_count: the_result.success_count,
            failure_count: the_result.failure_count,
            relocation: the_relocation,
            report: the_report,
        }))
    }

    fn resolve(&self, event: &NotificationEvent) -> Result<ObjectLocation, PipelineError> {
        event_filter::target_location(event).map_err(|source| {
            // 🔣 is_eligible vetted bucket and key above
            let the_first = event.first_record();
            PipelineError::Read {
                location: ObjectLocation::new(
                    the_first.and_then(|record| record.bucket_name()).unwrap_or_default(),
                    the_first.and_then(|record| record.raw_key()).unwrap_or_default(),
                ),
                source,
            }
        })
    }

    async fn read_and_judge(&self, location: &ObjectLocation) -> Result<ProcessingResult, PipelineError> {
        let the_source = RowSource::open(&self.storage, location).await?;
        self.processor.run(the_source.into_stream()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryObjectStore, StorageCall, StorageOp};
    use crate::error::{ErrorKind, RelocationStep};
    use crate::rules::{AcceptAll, RejectAll, RequireColumns};
    use serde_json::json;

    const THE_GARAGE: &str = "model,year\nF40,1987\nEnzo,\nF50,1995\nDino,\n308,1975\n";

    fn at(key: &str) -> ObjectLocation {
        ObjectLocation::new("ferrari-bucket", key)
    }

    fn a_put_into(key: &str) -> serde_json::Value {
        json!({
            "Records": [{
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "ferrari-bucket" },
                    "object": { "key": key }
                }
            }]
        })
    }

    async fn the_setup(rule: Arc<dyn RowRule>) -> (InMemoryObjectStore, Orchestrator) {
        let the_store = InMemoryObjectStore::new();
        the_store.insert_object(at("pending/testfile.csv"), THE_GARAGE).await;
        let the_orchestrator = Orchestrator::new(the_store.clone().into(), rule);
        (the_store, the_orchestrator)
    }

    fn completed(outcome: HandleOutcome) -> RunSummary {
        match outcome {
            HandleOutcome::Completed(summary) => summary,
            HandleOutcome::Skipped => panic!("expected a completed run, got Skipped"),
        }
    }

    #[tokio::test]
    async fn the_one_where_two_bad_rows_end_up_in_the_error_report() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(RequireColumns::new(["year"]))).await;

        let the_summary = completed(
            the_orchestrator
                .handle_payload(&a_put_into("pending/testfile.csv"))
                .await
                .expect("💀 a healthy run should complete"),
        );

        assert_eq!(the_summary.success_count, 3);
        assert_eq!(the_summary.failure_count, 2);
        assert!(the_summary.relocation.completed);
        assert_eq!(the_summary.report, Some(at("errors/testfile_errors.csv")));
        assert_eq!(
            the_store.calls().await,
            vec![
                StorageCall::Get(at("pending/testfile.csv")),
                StorageCall::Copy {
                    from: at("pending/testfile.csv"),
                    to: at("done/testfile_processed.csv"),
                },
                StorageCall::Delete(at("pending/testfile.csv")),
                StorageCall::Put {
                    location: at("errors/testfile_errors.csv"),
                    content_type: "text/csv".to_string(),
                },
            ]
        );

        let the_report = the_store
            .object(&at("errors/testfile_errors.csv"))
            .await
            .expect("💀 the report should exist");
        assert_eq!(the_report.bytes, b"model,year\nEnzo,\nDino,\n".to_vec());
    }

    #[tokio::test]
    async fn the_one_where_a_clean_file_gets_no_report() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(AcceptAll)).await;

        let the_summary = completed(
            the_orchestrator
                .handle_payload(&a_put_into("pending/testfile.csv"))
                .await
                .expect("💀 a clean run should complete"),
        );

        assert_eq!(the_summary.success_count, 5);
        assert_eq!(the_summary.report, None);
        assert_eq!(the_store.call_count(StorageOp::Put).await, 0);
        assert_eq!(the_store.keys().await, vec![at("done/testfile_processed.csv")]);
    }

    #[tokio::test]
    async fn the_one_where_every_row_fails_and_it_still_moves_to_done() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(RejectAll)).await;

        let the_summary = completed(
            the_orchestrator
                .handle_payload(&a_put_into("pending/testfile.csv"))
                .await
                .expect("💀 all-fail is still a completed run"),
        );

        assert_eq!(the_summary.success_count, 0);
        assert_eq!(the_summary.failure_count, 5);
        assert_eq!(
            the_store.keys().await,
            vec![at("done/testfile_processed.csv"), at("errors/testfile_errors.csv")]
        );
    }

    #[tokio::test]
    async fn the_one_where_ineligible_events_touch_nothing() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(AcceptAll)).await;

        let mut the_delete = a_put_into("pending/testfile.csv");
        the_delete["Records"][0]["eventName"] = json!("ObjectRemoved:Delete");

        for the_payload in [
            the_delete,
            a_put_into("done/testfile.csv"),
            json!({ "Records": [] }),
            json!("not even an object"),
        ] {
            let the_outcome = the_orchestrator
                .handle_payload(&the_payload)
                .await
                .expect("💀 skipping is not an error");
            assert_eq!(the_outcome, HandleOutcome::Skipped);
        }
        assert!(the_store.calls().await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_no_body_means_one_get_and_nothing_else() {
        let the_store = InMemoryObjectStore::new();
        the_store.insert_bodiless(at("pending/testfile.csv")).await;
        let the_orchestrator = Orchestrator::new(the_store.clone().into(), Arc::new(AcceptAll));

        let the_error = the_orchestrator
            .handle_payload(&a_put_into("pending/testfile.csv"))
            .await
            .expect_err("💀 no body is a read error");

        assert_eq!(the_error.kind(), ErrorKind::Read);
        assert_eq!(the_store.call_count(StorageOp::Get).await, 1);
        assert_eq!(the_store.call_count(StorageOp::Copy).await, 0);
        assert_eq!(the_store.call_count(StorageOp::Delete).await, 0);
        assert_eq!(the_store.call_count(StorageOp::Put).await, 0);
    }

    #[tokio::test]
    async fn the_one_where_malformed_csv_stops_before_any_mutation() {
        let the_store = InMemoryObjectStore::new();
        the_store
            .insert_object(at("pending/testfile.csv"), "model\nF40\n\"never closed\n")
            .await;
        let the_orchestrator = Orchestrator::new(the_store.clone().into(), Arc::new(AcceptAll));

        let the_error = the_orchestrator
            .handle_payload(&a_put_into("pending/testfile.csv"))
            .await
            .expect_err("💀 an unterminated quote is fatal");

        assert_eq!(the_error.kind(), ErrorKind::Read);
        assert_eq!(the_store.calls().await, vec![StorageCall::Get(at("pending/testfile.csv"))]);
    }

    #[tokio::test]
    async fn the_one_where_copy_fails_and_nothing_else_happens() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(RejectAll)).await;
        the_store.inject_fault(StorageOp::Copy).await;

        let the_error = the_orchestrator
            .handle_payload(&a_put_into("pending/testfile.csv"))
            .await
            .expect_err("💀 copy was told to fail");

        assert!(matches!(
            the_error,
            PipelineError::Relocation {
                step: RelocationStep::Copy,
                committed: false,
                ..
            }
        ));
        assert_eq!(the_store.call_count(StorageOp::Delete).await, 0);
        assert_eq!(the_store.call_count(StorageOp::Put).await, 0);
        assert_eq!(the_store.keys().await, vec![at("pending/testfile.csv")]);
    }

    #[tokio::test]
    async fn the_one_where_delete_fails_and_the_report_is_never_written() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(RejectAll)).await;
        the_store.inject_fault(StorageOp::Delete).await;

        let the_error = the_orchestrator
            .handle_payload(&a_put_into("pending/testfile.csv"))
            .await
            .expect_err("💀 delete was told to fail");

        assert!(the_error.left_partial_state());
        assert_eq!(the_store.call_count(StorageOp::Put).await, 0);
        assert_eq!(
            the_store.keys().await,
            vec![at("done/testfile_processed.csv"), at("pending/testfile.csv")]
        );
    }

    #[tokio::test]
    async fn the_one_where_the_report_fails_after_the_move_stuck() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(RejectAll)).await;
        the_store.inject_fault(StorageOp::Put).await;

        let the_error = the_orchestrator
            .handle_payload(&a_put_into("pending/testfile.csv"))
            .await
            .expect_err("💀 put was told to fail");

        assert_eq!(the_error.kind(), ErrorKind::Report);
        assert!(the_error.left_partial_state());
        assert_eq!(the_store.keys().await, vec![at("done/testfile_processed.csv")]);
    }

    #[tokio::test]
    async fn the_one_where_an_unprefixed_key_is_moved_out_of_pending() {
        let the_store = InMemoryObjectStore::new();
        let the_orchestrator = Orchestrator::new(the_store.clone().into(), Arc::new(AcceptAll));

        // 📥 a key that passes the filter without the pending/ prefix
        the_store.insert_object(at("my-pending-cars.csv"), THE_GARAGE).await;
        the_store.insert_object(at("pending/my-pending-cars.csv"), THE_GARAGE).await;
        let the_summary = completed(
            the_orchestrator
                .handle_payload(&a_put_into("my-pending-cars.csv"))
                .await
                .expect("💀 the normalized key exists"),
        );

        assert_eq!(the_summary.source, at("my-pending-cars.csv"));
        assert_eq!(the_summary.relocation.source, at("pending/my-pending-cars.csv"));
        assert_eq!(
            the_summary.relocation.destination,
            at("done/my-pending-cars_processed.csv")
        );
        assert!(the_store.object(&at("my-pending-cars.csv")).await.is_some());
    }

    #[tokio::test]
    async fn the_one_where_encoded_keys_are_decoded_before_the_get() {
        let the_store = InMemoryObjectStore::new();
        the_store.insert_object(at("pending/my cars (1).csv"), THE_GARAGE).await;
        let the_orchestrator = Orchestrator::new(the_store.clone().into(), Arc::new(AcceptAll));

        let the_summary = completed(
            the_orchestrator
                .handle_payload(&a_put_into("pending/my+cars+%281%29.csv"))
                .await
                .expect("💀 the decoded key exists"),
        );

        assert_eq!(the_summary.source, at("pending/my cars (1).csv"));
        assert_eq!(the_store.keys().await, vec![at("done/my cars (1)_processed.csv")]);
    }

    #[tokio::test]
    async fn the_one_where_malformed_triggers_are_skipped_not_errors() {
        let (the_store, the_orchestrator) = the_setup(Arc::new(AcceptAll)).await;

        let mut the_bucketless = a_put_into("pending/testfile.csv");
        the_bucketless["Records"][0]["s3"]
            .as_object_mut()
            .expect("💀 the fixture has an s3 object")
            .remove("bucket");

        for the_payload in [a_put_into("pending/%FF.csv"), the_bucketless] {
            let the_outcome = the_orchestrator
                .handle_payload(&the_payload)
                .await
                .expect("💀 a malformed trigger is a skip, not a failure");
            assert_eq!(the_outcome, HandleOutcome::Skipped);
        }
        assert!(the_store.calls().await.is_empty());
    }
}

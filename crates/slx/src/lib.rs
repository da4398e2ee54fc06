//! 🪣 slx: drain CSV drops out of `pending/`, judge every row, and sort the
//! results into `done/` and `errors/`.
//!
//! 🎬 One storage notification in. One object streamed row by row. One rule
//! applied to each row. One copy-then-delete move. One optional side-report.
//! Then the Lambda goes back to sleep and dreams of idempotency. 🦆

pub mod app_config;
pub mod backends;
pub mod common;
pub mod error;
pub mod event_filter;
pub mod orchestrator;
pub mod processor;
pub mod relocator;
pub mod reporter;
pub mod row_source;
pub mod rules;
pub mod zones;

pub use crate::app_config::{AppConfig, load_config};
pub use crate::backends::{InMemoryObjectStore, ObjectStore, S3ObjectStore, StorageBackend};
pub use crate::common::{ProcessingResult, RelocationOutcome, Row};
pub use crate::error::{ErrorKind, PipelineError};
pub use crate::orchestrator::{HandleOutcome, Orchestrator, RunSummary};
pub use crate::rules::{RowRule, RuleConfig};
pub use crate::zones::{ObjectLocation, Zone};

/// 🚀 Build everything from config and handle one raw notification payload.
pub async fn run(app_config: &AppConfig, payload: &serde_json::Value) -> anyhow::Result<HandleOutcome> {
    let the_store = S3ObjectStore::new(&app_config.storage).await?;
    let the_orchestrator = Orchestrator::new(the_store.into(), app_config.rule.build());
    Ok(the_orchestrator.handle_payload(payload).await?)
}

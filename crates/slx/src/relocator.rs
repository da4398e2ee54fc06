//! 🚚 Relocator: move a processed object from `pending/` to `done/`.
//!
//! 🎬 *[the object packs one suitcase. it is about to be copied, then deleted.
//! it has been told this is "moving". it has its doubts.]*
//!
//! The store has no rename, so a move is two calls:
//!
//! ```text
//!   copy(pending/cars.csv → done/cars_processed.csv)   ← fails? nothing changed
//!   delete(pending/cars.csv)                           ← fails? two copies exist
//! ```
//!
//! Both halves are logged and reported with enough detail that whoever is on
//! call can tell which half happened. There is no rollback. 🦆

use tracing::{error, info};

use crate::backends::{ObjectStore, StorageBackend};
use crate::common::RelocationOutcome;
use crate::error::{PipelineError, RelocationStep};
use crate::zones::{ObjectLocation, Zone};

#[derive(Debug, Clone)]
pub struct Relocator {
    storage: StorageBackend,
}

impl Relocator {
    pub fn new(storage: StorageBackend) -> Self {
        Self { storage }
    }

    /// 📍 `pending/cars.csv` → `done/cars_processed.csv`. Pure, no I/O.
    pub fn destination_for(source: &ObjectLocation) -> ObjectLocation {
        source.relocated_to(Zone::Done)
    }

    /// 🚚 Copy, then delete. Always from the `pending/`-normalized key.
    pub async fn relocate(&self, source: &ObjectLocation) -> Result<RelocationOutcome, PipelineError> {
        let the_source = source.pending_normalized();
        let mut the_outcome = RelocationOutcome {
            destination: Self::destination_for(&the_source),
            source: the_source,
            completed: false,
        };

        if let Err(source) = self
            .storage
            .copy(&the_outcome.source, &the_outcome.destination)
            .await
        {
            error!(
                "💀 copy {} failed, nothing was committed and the source is untouched: {:#}",
                the_outcome, source
            );
            return Err(PipelineError::Relocation {
                outcome: the_outcome,
                step: RelocationStep::Copy,
                committed: false,
                source,
            });
        }

        if let Err(source) = self.storage.delete(&the_outcome.source).await {
            error!(
                "💀 delete after copy failed for {}: the destination exists AND the source is still there. \
                 Partial relocation, expect a duplicate: {:#}",
                the_outcome, source
            );
            return Err(PipelineError::Relocation {
                outcome: the_outcome,
                step: RelocationStep::Delete,
                committed: true,
                source,
            });
        }

        the_outcome.completed = true;
        info!("🚚 relocated {}", the_outcome);
        Ok(the_outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryObjectStore, StorageCall, StorageOp};

    fn at(key: &str) -> ObjectLocation {
        ObjectLocation::new("ferrari-bucket", key)
    }

    async fn a_store_with(key: &str) -> InMemoryObjectStore {
        let the_store = InMemoryObjectStore::new();
        the_store.insert_object(at(key), "model\nF40\n").await;
        the_store
    }

    #[test]
    fn the_one_where_destinations_are_pure_arithmetic() {
        assert_eq!(
            Relocator::destination_for(&at("pending/testfile.csv")),
            at("done/testfile_processed.csv")
        );
        assert_eq!(
            Relocator::destination_for(&at("pending/2024/q1/cars.csv")),
            at("done/2024/q1/cars_processed.csv")
        );
    }

    #[tokio::test]
    async fn the_one_where_the_move_is_a_copy_then_a_delete() {
        let the_store = a_store_with("pending/cars.csv").await;
        let the_relocator = Relocator::new(the_store.clone().into());

        let the_outcome = the_relocator
            .relocate(&at("pending/cars.csv"))
            .await
            .expect("💀 a healthy store should relocate");

        assert!(the_outcome.completed);
        assert_eq!(the_outcome.destination, at("done/cars_processed.csv"));
        assert_eq!(the_store.keys().await, vec![at("done/cars_processed.csv")]);
        assert_eq!(
            the_store.calls().await,
            vec![
                StorageCall::Copy {
                    from: at("pending/cars.csv"),
                    to: at("done/cars_processed.csv"),
                },
                StorageCall::Delete(at("pending/cars.csv")),
            ]
        );
    }

    #[tokio::test]
    async fn the_one_where_an_unprefixed_key_moves_out_of_pending_anyway() {
        let the_store = a_store_with("pending/cars.csv").await;
        let the_outcome = Relocator::new(the_store.clone().into())
            .relocate(&at("cars.csv"))
            .await
            .expect("💀 the normalized key exists, so this should work");

        assert_eq!(the_outcome.source, at("pending/cars.csv"));
        assert_eq!(the_store.keys().await, vec![at("done/cars_processed.csv")]);
    }

    #[tokio::test]
    async fn the_one_where_copy_fails_and_delete_never_happens() {
        let the_store = a_store_with("pending/cars.csv").await;
        the_store.inject_fault(StorageOp::Copy).await;

        let the_error = Relocator::new(the_store.clone().into())
            .relocate(&at("pending/cars.csv"))
            .await
            .expect_err("💀 copy was told to fail");

        match &the_error {
            PipelineError::Relocation {
                step, committed, outcome, ..
            } => {
                assert_eq!(*step, RelocationStep::Copy);
                assert!(!committed);
                assert!(!outcome.completed);
            }
            other => panic!("expected a relocation error, got {other:?}"),
        }
        assert!(!the_error.left_partial_state());
        assert_eq!(the_store.call_count(StorageOp::Delete).await, 0);
        assert_eq!(the_store.keys().await, vec![at("pending/cars.csv")]);
    }

    #[tokio::test]
    async fn the_one_where_delete_fails_and_the_duplicate_is_admitted() {
        let the_store = a_store_with("pending/cars.csv").await;
        the_store.inject_fault(StorageOp::Delete).await;

        let the_error = Relocator::new(the_store.clone().into())
            .relocate(&at("pending/cars.csv"))
            .await
            .expect_err("💀 delete was told to fail");

        assert!(matches!(
            the_error,
            PipelineError::Relocation {
                step: RelocationStep::Delete,
                committed: true,
                ..
            }
        ));
        assert!(the_error.left_partial_state());
        assert_eq!(
            the_store.keys().await,
            vec![at("done/cars_processed.csv"), at("pending/cars.csv")]
        );
    }
}

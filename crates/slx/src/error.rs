//! 💀 The error taxonomy. Every way a run can die, and what it left behind.
//!
//! ```text
//!   filter mismatch ──▶ not an error (HandleOutcome::Skipped)
//!   Read            ──▶ fatal, nothing mutated yet
//!   row failure     ──▶ not an error (it's data, see ProcessingResult)
//!   Relocation      ──▶ fatal, `committed` says whether the copy already landed
//!   Report          ──▶ fatal, relocation already committed and staying that way
//! ```
//!
//! Storage-layer causes arrive as `anyhow::Error` chains and ride along as `source`.

use std::fmt;

use thiserror::Error;

use crate::common::RelocationOutcome;
use crate::zones::ObjectLocation;

/// 🪜 Which half of the copy-then-delete move fell over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationStep {
    Copy,
    Delete,
}

impl fmt::Display for RelocationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// 🏷️ Flat discriminant of `PipelineError`, handy for matching and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Read,
    Relocation,
    Report,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 📥 No body, a broken stream, or a key we could not decode. Zero mutations so far.
    #[error("💀 could not read rows from {location}")]
    Read {
        location: ObjectLocation,
        #[source]
        source: anyhow::Error,
    },

    /// 🚚 The move failed. `committed == true` means the destination copy exists
    /// and the source was NOT deleted: two copies, one bucket, zero atomicity.
    #[error("💀 relocating {outcome} failed at the {step} step ({})", describe_commit(.committed))]
    Relocation {
        outcome: RelocationOutcome,
        step: RelocationStep,
        committed: bool,
        #[source]
        source: anyhow::Error,
    },

    /// 📝 The side-report write failed after the source was already relocated.
    #[error("💀 writing error report {report_location} for {location} failed after relocation was committed")]
    Report {
        location: ObjectLocation,
        report_location: ObjectLocation,
        #[source]
        source: anyhow::Error,
    },
}

fn describe_commit(committed: &bool) -> &'static str {
    if *committed {
        "partial: destination written, source still present"
    } else {
        "nothing committed, source untouched"
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } => ErrorKind::Read,
            Self::Relocation { .. } => ErrorKind::Relocation,
            Self::Report { .. } => ErrorKind::Report,
        }
    }

    /// ⚠️ Did this failure leave storage half-changed?
    ///
    /// A failed delete leaves a duplicate. A failed report leaves a relocated
    /// object with no side-report. Reads and failed copies leave nothing.
    pub fn left_partial_state(&self) -> bool {
        match self {
            Self::Read { .. } => false,
            Self::Relocation { committed, .. } => *committed,
            Self::Report { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn the_outcome() -> RelocationOutcome {
        RelocationOutcome {
            source: ObjectLocation::new("b", "pending/cars.csv"),
            destination: ObjectLocation::new("b", "done/cars_processed.csv"),
            completed: false,
        }
    }

    #[test]
    fn the_one_where_a_failed_copy_and_a_failed_delete_read_differently() {
        let the_copy_flop = PipelineError::Relocation {
            outcome: the_outcome(),
            step: RelocationStep::Copy,
            committed: false,
            source: anyhow!("AccessDenied"),
        };
        let the_delete_flop = PipelineError::Relocation {
            outcome: the_outcome(),
            step: RelocationStep::Delete,
            committed: true,
            source: anyhow!("SlowDown"),
        };

        assert!(the_copy_flop.to_string().contains("copy step"));
        assert!(the_copy_flop.to_string().contains("nothing committed"));
        assert!(!the_copy_flop.left_partial_state());

        assert!(the_delete_flop.to_string().contains("delete step"));
        assert!(the_delete_flop.to_string().contains("partial"));
        assert!(the_delete_flop.left_partial_state());
        assert_eq!(the_delete_flop.kind(), ErrorKind::Relocation);
    }

    #[test]
    fn the_one_where_the_cause_survives_the_trip() {
        let the_read_flop = PipelineError::Read {
            location: ObjectLocation::new("b", "pending/cars.csv"),
            source: anyhow!("No body found in response"),
        };
        let the_cause = std::error::Error::source(&the_read_flop)
            .map(|cause| cause.to_string())
            .unwrap_or_default();
        assert_eq!(the_cause, "No body found in response");
        assert_eq!(the_read_flop.kind(), ErrorKind::Read);
    }
}

//! Error types for report processing

use crate::layout::BandKind;
use crate::state::{EventCode, SnapshotId};
use thiserror::Error;

/// Failure of a processing run.
///
/// Every variant aborts the run. The core never retries; re-running from a
/// checkpoint is the driver's decision.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("cannot wrap handler: {0}")]
    InvalidWrap(String),

    #[error("advance called on finished snapshot {0:?}")]
    AdvancePastFinish(SnapshotId),

    #[error("handler {handler:?} is not active on snapshot {snapshot:?} (active: {active:?})")]
    HandlerMismatch {
        snapshot: SnapshotId,
        handler: EventCode,
        active: EventCode,
    },

    #[error("snapshot {snapshot:?} references a {collaborator} that is not in effect")]
    ForeignCollaborator {
        snapshot: SnapshotId,
        collaborator: &'static str,
    },

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("data access failed: {0}")]
    DataAccess(String),

    #[error("{kind:?} band for row {row} is {height} tall but an empty page body holds {available}")]
    OversizedBand {
        kind: BandKind,
        row: usize,
        height: f32,
        available: f32,
    },

    #[error("{capacity} checkpoints cannot cover a header chain {depth} groups deep")]
    InsufficientCheckpoints { capacity: usize, depth: usize },

    #[error("no retained checkpoint for snapshot {0:?}")]
    UnknownCheckpoint(SnapshotId),

    #[error("row context checkpoint {0} was evicted")]
    CheckpointEvicted(u64),

    #[error("processing did not finish within {0} cycles")]
    CycleLimit(usize),

    #[error("processing exceeded its time budget of {0} ms")]
    DeadlineExceeded(u64),

    #[error("output stage failed: {0}")]
    Output(String),
}

/// Failure to load configuration or report input
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid report definition: {0}")]
    Invalid(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

pub type Result<T, E = ProcessingError> = std::result::Result<T, E>;

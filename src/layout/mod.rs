//! Layout process: content placement and page breaking

mod engine;
mod measure;
mod pagination;

pub use engine::PageLayouter;
pub use measure::BandMeasure;
pub use pagination::{BandKind, PageLayout, PaginationRules, PlacedBand};

use crate::context::RowContext;
use crate::error::Result;
use crate::state::{LayoutHandle, ProcessSnapshot, SnapshotId};
use serde::{Deserialize, Serialize};

/// Layout answer for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    /// Content placed on the open page
    #[default]
    Placed,
    /// Content did not fit; the open page must be finished first
    PageBreak,
    /// Queued content is not resolved yet; try once more before moving on
    Pending,
    /// Resume processing from a retained snapshot
    Rollback { checkpoint: SnapshotId },
}

/// Collaborator placing the content produced by each step
pub trait LayoutProcess {
    fn handle(&self) -> LayoutHandle;

    /// Place the content of the snapshot's event
    fn place(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Result<Placement>;

    /// Attempt to place queued content again for the same step
    fn restart(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Result<Placement>;

    /// Rewind to the state held when `checkpoint` was current
    fn rollback(&mut self, checkpoint: &ProcessSnapshot) -> Result<()>;
}

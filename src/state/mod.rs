//! Report-processing state machine: snapshots and transition handlers

mod arena;
mod handler;
pub mod pending;
mod snapshot;

pub use arena::SnapshotArena;
pub use handler::{Handler, HandlerRef};
pub use snapshot::{
    CheckpointId, ContextHandle, EventCode, GroupFrame, GroupStack, LayoutHandle, Position,
    ProcessSnapshot, ReportEvent, RowContextRef, SnapshotId,
};

use crate::context::RowContext;
use crate::data::{DataCursor, ReportStructure, RowStream};
use crate::error::Result;
use crate::layout::{LayoutProcess, Placement};

/// Collaborators a handler works against for one step
///
/// Snapshots reference the row context and layout process by handle; the
/// environment supplies the instances those handles designate.
pub struct ProcessEnv<'a> {
    pub cursor: &'a dyn DataCursor,
    pub stream: &'a RowStream,
    pub structure: &'a ReportStructure,
    pub rows: &'a mut dyn RowContext,
    pub layout: &'a mut dyn LayoutProcess,
    pub arena: &'a mut SnapshotArena,
}

impl<'a> ProcessEnv<'a> {
    /// Snapshot a run starts from
    pub fn initial_snapshot(&mut self) -> Result<ProcessSnapshot> {
        let first_item = if self.stream.is_empty() {
            0
        } else {
            self.stream.data_item(0)?
        };
        Ok(ProcessSnapshot::initial(
            self.arena,
            first_item,
            self.rows.handle(),
            self.layout.handle(),
        ))
    }

    pub(crate) fn derive(&mut self, snapshot: &ProcessSnapshot) -> ProcessSnapshot {
        snapshot.derive_for_advance(self.arena)
    }

    pub(crate) fn publish(&mut self, snapshot: ProcessSnapshot) -> ProcessSnapshot {
        self.arena.record(&snapshot);
        snapshot
    }

    /// Refresh the row context, deliver the snapshot's event, then place it
    ///
    /// A row is placed first and its event delivered only once it has landed
    /// on a page. A row that answers a page break or rollback is advanced
    /// again later, so functions count it exactly once.
    pub(crate) fn refresh_and_place(&mut self, snapshot: &mut ProcessSnapshot) -> Result<()> {
        self.rows.refresh(snapshot, self.cursor)?;
        if snapshot.event_code() != EventCode::ItemsAdvanced {
            self.rows.fire(&snapshot.report_event(), self.cursor)?;
            let placement = self.layout.place(snapshot, &*self.rows)?;
            snapshot.set_placement(placement);
            return Ok(());
        }

        let placement = self.layout.place(snapshot, &*self.rows)?;
        snapshot.set_placement(placement);
        if matches!(placement, Placement::Placed | Placement::Pending) {
            self.rows.fire(&snapshot.report_event(), self.cursor)?;
        }
        Ok(())
    }

    pub(crate) fn move_to_row(&self, snapshot: &mut ProcessSnapshot, row: usize) -> Result<()> {
        let item = self.stream.data_item(row)?;
        snapshot.move_to_row(row, item);
        Ok(())
    }

    pub(crate) fn break_level(&self, row: usize, next: usize) -> Result<Option<usize>> {
        self.structure
            .break_level(self.cursor, self.stream, row, next)
    }
}

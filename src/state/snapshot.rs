//! Immutable process snapshots

use crate::layout::Placement;
use crate::state::{Handler, HandlerRef, SnapshotArena};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::rc::Rc;

/// Arena-assigned identity of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

/// Phase a snapshot represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCode {
    ReportStarted,
    GroupStarted,
    ItemsAdvanced,
    GroupFinished,
    PageStarted,
    PageFinished,
    ReportFinished,
}

impl EventCode {
    /// Page bracketing events
    pub fn is_page_event(&self) -> bool {
        matches!(self, EventCode::PageStarted | EventCode::PageFinished)
    }
}

/// An open group on the group stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupFrame {
    /// Level in the report structure (0 = outermost)
    pub level: usize,
    /// Stream row at which the group occurrence started
    pub start_row: usize,
}

/// Open groups, outermost first
pub type GroupStack = SmallVec<[GroupFrame; 4]>;

/// Identity of a row context instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContextHandle(pub u32);

/// Identity of a layout process instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayoutHandle(pub u32);

/// Saved row context state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub u64);

/// Reference to the row context in effect, plus the checkpoint taken for
/// this snapshot when it is a rollback origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowContextRef {
    pub context: ContextHandle,
    pub checkpoint: Option<CheckpointId>,
}

/// Traversal fields of a snapshot, comparable across replays
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row_index: usize,
    pub data_item_index: usize,
    pub groups: GroupStack,
    pub event: EventCode,
    pub page_number: usize,
    pub finished: bool,
}

/// Event delivered to row functions and layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportEvent {
    pub code: EventCode,
    pub row_index: usize,
    pub data_item_index: usize,
    /// Group level opened or closed by group events
    pub group_level: Option<usize>,
    pub page_number: usize,
}

/// One point in the traversal
///
/// Snapshots are never mutated once handed out. Every transition derives a
/// new snapshot with a fresh id whose predecessor is the snapshot it came
/// from. Collaborators are referenced by handle, not owned.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    id: SnapshotId,
    predecessor: Option<SnapshotId>,
    row_index: usize,
    data_item_index: usize,
    groups: GroupStack,
    event: EventCode,
    handler: HandlerRef,
    row_context: RowContextRef,
    layout_process: LayoutHandle,
    page_number: usize,
    page_open: bool,
    placement: Placement,
    finished: bool,
}

impl ProcessSnapshot {
    /// First snapshot of a run, governed by the report-start handler
    pub fn initial(
        arena: &mut SnapshotArena,
        first_data_item: usize,
        context: ContextHandle,
        layout_process: LayoutHandle,
    ) -> Self {
        let handler = Rc::new(Handler::ReportStart);
        let snapshot = Self {
            id: arena.allocate(),
            predecessor: None,
            row_index: 0,
            data_item_index: first_data_item,
            groups: GroupStack::new(),
            event: handler.event_code(),
            handler,
            row_context: RowContextRef {
                context,
                checkpoint: None,
            },
            layout_process,
            page_number: 0,
            page_open: false,
            placement: Placement::Placed,
            finished: false,
        };
        arena.record(&snapshot);
        snapshot
    }

    /// Copy for the next step: fresh id, linked to this snapshot
    ///
    /// The layout answer and checkpoint belong to the step that produced
    /// them and are not carried forward.
    pub fn derive_for_advance(&self, arena: &mut SnapshotArena) -> Self {
        Self {
            id: arena.allocate(),
            predecessor: Some(self.id),
            groups: self.groups.clone(),
            handler: Rc::clone(&self.handler),
            row_context: RowContextRef {
                context: self.row_context.context,
                checkpoint: None,
            },
            placement: Placement::Placed,
            ..*self
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn predecessor(&self) -> Option<SnapshotId> {
        self.predecessor
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn data_item_index(&self) -> usize {
        self.data_item_index
    }

    pub fn groups(&self) -> &[GroupFrame] {
        &self.groups
    }

    /// Nesting depth of open groups
    pub fn group_depth(&self) -> usize {
        self.groups.len()
    }

    /// Row at which the open group at `level` started
    pub fn group_start_row(&self, level: usize) -> Option<usize> {
        self.groups
            .iter()
            .find(|f| f.level == level)
            .map(|f| f.start_row)
    }

    pub fn event_code(&self) -> EventCode {
        self.event
    }

    /// Handler governing advancement from this snapshot
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn handler_ref(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn row_context(&self) -> RowContextRef {
        self.row_context
    }

    pub fn layout_process(&self) -> LayoutHandle {
        self.layout_process
    }

    /// Pages started so far (1-based number of the current page)
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn page_open(&self) -> bool {
        self.page_open
    }

    /// Layout answer for the step that produced this snapshot
    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Traversal fields for determinism comparisons
    pub fn position(&self) -> Position {
        Position {
            row_index: self.row_index,
            data_item_index: self.data_item_index,
            groups: self.groups.clone(),
            event: self.event,
            page_number: self.page_number,
            finished: self.finished,
        }
    }

    /// Event this snapshot delivers to functions and layout
    pub fn report_event(&self) -> ReportEvent {
        let group_level = match self.event {
            EventCode::GroupStarted => self.groups.last().map(|f| f.level),
            EventCode::GroupFinished => Some(self.groups.len()),
            _ => None,
        };
        ReportEvent {
            code: self.event,
            row_index: self.row_index,
            data_item_index: self.data_item_index,
            group_level,
            page_number: self.page_number,
        }
    }

    // Mutators for snapshots that have not been handed out yet.

    pub(crate) fn install(&mut self, handler: HandlerRef) {
        self.event = handler.event_code();
        self.handler = handler;
    }

    pub(crate) fn set_event(&mut self, event: EventCode) {
        self.event = event;
    }

    pub(crate) fn move_to_row(&mut self, row_index: usize, data_item_index: usize) {
        self.row_index = row_index;
        self.data_item_index = data_item_index;
    }

    pub(crate) fn push_group(&mut self, frame: GroupFrame) {
        self.groups.push(frame);
    }

    pub(crate) fn pop_group(&mut self) -> Option<GroupFrame> {
        self.groups.pop()
    }

    pub(crate) fn start_page(&mut self) {
        self.page_number += 1;
        self.page_open = true;
    }

    pub(crate) fn close_page(&mut self) {
        self.page_open = false;
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub(crate) fn set_checkpoint(&mut self, checkpoint: CheckpointId) {
        self.row_context.checkpoint = Some(checkpoint);
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial(arena: &mut SnapshotArena) -> ProcessSnapshot {
        ProcessSnapshot::initial(arena, 0, ContextHandle(1), LayoutHandle(1))
    }

    #[test]
    fn test_initial_snapshot() {
        let mut arena = SnapshotArena::new(false);
        let s = initial(&mut arena);
        assert_eq!(s.event_code(), EventCode::ReportStarted);
        assert_eq!(*s.handler(), Handler::ReportStart);
        assert!(s.predecessor().is_none());
        assert!(!s.is_finished());
    }

    #[test]
    fn test_derive_allocates_new_snapshot() {
        let mut arena = SnapshotArena::new(false);
        let s = initial(&mut arena);
        let d = s.derive_for_advance(&mut arena);
        assert_ne!(d.id(), s.id());
        assert_eq!(d.predecessor(), Some(s.id()));
        assert_eq!(d.position(), s.position());
        assert!(Rc::ptr_eq(d.handler_ref(), s.handler_ref()));
    }

    #[test]
    fn test_rederived_steps_compare_equal() {
        let mut arena = SnapshotArena::new(false);
        let s = initial(&mut arena);
        let mut a = s.derive_for_advance(&mut arena);
        let mut b = s.derive_for_advance(&mut arena);
        for d in [&mut a, &mut b] {
            d.push_group(GroupFrame { level: 0, start_row: 0 });
            d.set_event(EventCode::GroupStarted);
        }
        assert_eq!(a.position(), b.position());
        assert_eq!(s.group_depth(), 0);
        assert_eq!(a.group_start_row(0), Some(0));
        assert_eq!(a.report_event().group_level, Some(0));
    }

    #[test]
    fn test_checkpoint_not_carried_forward() {
        let mut arena = SnapshotArena::new(false);
        let mut s = initial(&mut arena);
        s.set_checkpoint(CheckpointId(3));
        s.set_placement(Placement::PageBreak);
        let d = s.derive_for_advance(&mut arena);
        assert_eq!(d.row_context().checkpoint, None);
        assert_eq!(d.placement(), Placement::Placed);
    }
}

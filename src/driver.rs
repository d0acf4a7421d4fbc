//! Driver loop: steps a report through advance and commit

use crate::config::ProcessingConfig;
use crate::context::RowContext;
use crate::data::{DataCursor, ReportStructure, RowStream};
use crate::error::{ProcessingError, Result};
use crate::layout::{LayoutProcess, Placement};
use crate::output::{CommittedStep, EventStream, StepObserver};
use crate::state::{ProcessEnv, ProcessSnapshot, SnapshotArena, SnapshotId};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use tracing::debug;

/// Owns the collaborators of one report run and drives it to completion
///
/// Observers run between `advance` and `commit`. They may see steps that a
/// later rollback discards; the returned [`EventStream`] holds only the
/// steps that survived.
pub struct ReportProcessor<C, R, L> {
    cursor: C,
    stream: RowStream,
    structure: ReportStructure,
    rows: R,
    layout: L,
    arena: SnapshotArena,
    config: ProcessingConfig,
    committed: EventStream,
    /// Committed stream length when each checkpoint was installed
    stream_marks: FxHashMap<SnapshotId, usize>,
    cycles: usize,
    rollbacks: usize,
}

impl<C, R, L> ReportProcessor<C, R, L>
where
    C: DataCursor,
    R: RowContext,
    L: LayoutProcess,
{
    pub fn new(
        cursor: C,
        structure: ReportStructure,
        rows: R,
        layout: L,
        config: ProcessingConfig,
    ) -> Result<Self> {
        structure.validate(&cursor)?;
        // a rollback returns to the outermost header of a nested chain
        if config.checkpoint_capacity < structure.group_count() {
            return Err(ProcessingError::InsufficientCheckpoints {
                capacity: config.checkpoint_capacity,
                depth: structure.group_count(),
            });
        }
        let stream = RowStream::identity(cursor.row_count());
        Ok(Self {
            cursor,
            stream,
            structure,
            rows,
            layout,
            arena: SnapshotArena::new(config.keep_history),
            config,
            committed: EventStream::new(),
            stream_marks: FxHashMap::default(),
            cycles: 0,
            rollbacks: 0,
        })
    }

    /// Traverse a padded row stream instead of one row per data item
    pub fn with_row_stream(mut self, stream: RowStream) -> Result<Self> {
        for row in 0..stream.len() {
            let item = stream.data_item(row)?;
            if item >= self.cursor.row_count() {
                return Err(ProcessingError::DataAccess(format!(
                    "row {} designates data item {} but source has {} rows",
                    row,
                    item,
                    self.cursor.row_count()
                )));
            }
        }
        self.stream = stream;
        Ok(self)
    }

    /// Collaborators for handler calls made outside the loop
    pub fn env(&mut self) -> ProcessEnv<'_> {
        ProcessEnv {
            cursor: &self.cursor,
            stream: &self.stream,
            structure: &self.structure,
            rows: &mut self.rows,
            layout: &mut self.layout,
            arena: &mut self.arena,
        }
    }

    /// Initial snapshot of a fresh run
    pub fn start(&mut self) -> Result<ProcessSnapshot> {
        self.committed = EventStream::new();
        self.stream_marks.clear();
        self.cycles = 0;
        self.rollbacks = 0;
        debug!(
            rows = self.stream.len(),
            groups = self.structure.group_count(),
            "report processing started"
        );
        self.env().initial_snapshot()
    }

    /// Advance with the snapshot's active handler
    pub fn advance(&mut self, snapshot: &ProcessSnapshot) -> Result<ProcessSnapshot> {
        let handler = Rc::clone(snapshot.handler_ref());
        handler.advance(snapshot, &mut self.env())
    }

    /// Commit with the snapshot's active handler
    pub fn commit(&mut self, snapshot: &ProcessSnapshot) -> Result<ProcessSnapshot> {
        let handler = Rc::clone(snapshot.handler_ref());
        let next = handler.commit(snapshot, &mut self.env())?;
        if next.row_context().checkpoint.is_some() {
            self.stream_marks.insert(next.id(), self.committed.len());
            if self.arena.prune_checkpoints(self.config.checkpoint_capacity) > 0 {
                let arena = &self.arena;
                self.stream_marks.retain(|id, _| arena.get(*id).is_some());
            }
        }
        Ok(next)
    }

    /// Run the report from the start until it finishes
    pub fn run(&mut self, observer: &mut dyn StepObserver) -> Result<EventStream> {
        let snapshot = self.start()?;
        self.drive(snapshot, observer)
    }

    /// Resume from a retained checkpoint, discarding every step after it
    pub fn replay_from(
        &mut self,
        checkpoint: &ProcessSnapshot,
        observer: &mut dyn StepObserver,
    ) -> Result<EventStream> {
        if self.arena.get(checkpoint.id()).is_none() {
            return Err(ProcessingError::UnknownCheckpoint(checkpoint.id()));
        }
        self.cycles = 0;
        self.rewind(checkpoint)?;
        self.drive(checkpoint.clone(), observer)
    }

    fn drive(
        &mut self,
        mut snapshot: ProcessSnapshot,
        observer: &mut dyn StepObserver,
    ) -> Result<EventStream> {
        while !snapshot.is_finished() {
            self.cycles += 1;
            if self.cycles > self.config.max_cycles {
                return Err(ProcessingError::CycleLimit(self.config.max_cycles));
            }

            let advanced = self.advance(&snapshot)?;
            if let Placement::Rollback { checkpoint } = advanced.placement() {
                snapshot = self.rollback_to(checkpoint)?;
                continue;
            }

            observer.observe(&advanced)?;
            self.committed.push(CommittedStep::from_snapshot(&advanced));
            snapshot = self.commit(&advanced)?;
        }
        debug!(
            steps = self.committed.len(),
            cycles = self.cycles,
            rollbacks = self.rollbacks,
            "report processing finished"
        );
        Ok(self.committed.clone())
    }

    fn rollback_to(&mut self, checkpoint: SnapshotId) -> Result<ProcessSnapshot> {
        let origin = self
            .arena
            .get(checkpoint)
            .cloned()
            .ok_or(ProcessingError::UnknownCheckpoint(checkpoint))?;
        self.rewind(&origin)?;
        self.rollbacks += 1;
        Ok(origin)
    }

    /// Restore row context and layout to a checkpoint and drop later steps
    fn rewind(&mut self, origin: &ProcessSnapshot) -> Result<()> {
        let saved = origin
            .row_context()
            .checkpoint
            .ok_or(ProcessingError::UnknownCheckpoint(origin.id()))?;
        self.rows.restore_checkpoint(saved)?;
        self.layout.rollback(origin)?;
        if let Some(&len) = self.stream_marks.get(&origin.id()) {
            self.committed.truncate(len);
        }
        if self.arena.release_checkpoints_after(origin.id()) > 0 {
            let arena = &self.arena;
            self.stream_marks.retain(|id, _| arena.get(*id).is_some());
        }
        debug!(
            checkpoint = origin.id().0,
            row = origin.row_index(),
            steps = self.committed.len(),
            "rewound to checkpoint"
        );
        Ok(())
    }

    pub fn committed(&self) -> &EventStream {
        &self.committed
    }

    pub fn arena(&self) -> &SnapshotArena {
        &self.arena
    }

    pub fn rows(&self) -> &R {
        &self.rows
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Rollbacks performed by the current run
    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    /// Advance/commit cycles used by the current run or replay
    pub fn cycles(&self) -> usize {
        self.cycles
    }
}

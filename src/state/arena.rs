//! Snapshot arena: id allocation and retention of rollback origins

use crate::state::{ProcessSnapshot, SnapshotId};
use rustc_hash::FxHashMap;

/// Allocates snapshot ids and keeps the snapshots someone may return to
///
/// Superseded snapshots are dropped by their owners. Only checkpoints, and
/// every snapshot when history is kept, stay reachable here.
#[derive(Debug, Default)]
pub struct SnapshotArena {
    next_id: u64,
    retained: FxHashMap<SnapshotId, ProcessSnapshot>,
    keep_history: bool,
}

impl SnapshotArena {
    pub fn new(keep_history: bool) -> Self {
        Self {
            next_id: 0,
            retained: FxHashMap::default(),
            keep_history,
        }
    }

    /// Next unused snapshot id
    pub fn allocate(&mut self) -> SnapshotId {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record a snapshot if full history is kept
    pub fn record(&mut self, snapshot: &ProcessSnapshot) {
        if self.keep_history {
            self.retained.insert(snapshot.id(), snapshot.clone());
        }
    }

    /// Keep a snapshot as a rollback origin
    pub fn retain(&mut self, snapshot: &ProcessSnapshot) {
        self.retained.insert(snapshot.id(), snapshot.clone());
    }

    /// Drop a retained snapshot
    pub fn release(&mut self, id: SnapshotId) -> Option<ProcessSnapshot> {
        self.retained.remove(&id)
    }

    pub fn get(&self, id: SnapshotId) -> Option<&ProcessSnapshot> {
        self.retained.get(&id)
    }

    /// Walk predecessors starting at `id`, as far as they are retained
    pub fn lineage(&self, id: SnapshotId) -> Vec<&ProcessSnapshot> {
        let mut chain = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            match self.retained.get(&current) {
                Some(snapshot) => {
                    chain.push(snapshot);
                    next = snapshot.predecessor();
                }
                None => break,
            }
        }
        chain
    }

    /// Retained snapshots carrying a row context checkpoint, oldest first
    pub fn checkpoints(&self) -> Vec<SnapshotId> {
        let mut ids: Vec<_> = self
            .retained
            .values()
            .filter(|s| s.row_context().checkpoint.is_some())
            .map(|s| s.id())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Release the oldest checkpoints beyond `capacity`; history is never pruned
    pub fn prune_checkpoints(&mut self, capacity: usize) -> usize {
        if self.keep_history {
            return 0;
        }
        let ids = self.checkpoints();
        let excess = ids.len().saturating_sub(capacity);
        for id in &ids[..excess] {
            self.retained.remove(id);
        }
        excess
    }

    /// Release checkpoints taken after `id`; history is never pruned
    pub fn release_checkpoints_after(&mut self, id: SnapshotId) -> usize {
        if self.keep_history {
            return 0;
        }
        let before = self.retained.len();
        self.retained
            .retain(|kept, s| *kept <= id || s.row_context().checkpoint.is_none());
        before - self.retained.len()
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u64 {
        self.next_id
    }

    pub fn keeps_history(&self) -> bool {
        self.keep_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CheckpointId, ContextHandle, LayoutHandle};

    #[test]
    fn test_history_and_lineage() {
        let mut arena = SnapshotArena::new(true);
        let a = ProcessSnapshot::initial(&mut arena, 0, ContextHandle(0), LayoutHandle(0));
        let b = a.derive_for_advance(&mut arena);
        arena.record(&b);
        let c = b.derive_for_advance(&mut arena);
        arena.record(&c);

        let ids: Vec<_> = arena.lineage(c.id()).iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![c.id(), b.id(), a.id()]);
        assert_eq!(arena.allocated(), 3);
    }

    #[test]
    fn test_without_history_only_retained_kept() {
        let mut arena = SnapshotArena::new(false);
        let a = ProcessSnapshot::initial(&mut arena, 0, ContextHandle(0), LayoutHandle(0));
        let b = a.derive_for_advance(&mut arena);
        arena.record(&b);
        assert_eq!(arena.retained_count(), 0);

        arena.retain(&b);
        assert!(arena.get(b.id()).is_some());
        assert!(arena.release(b.id()).is_some());
        assert!(arena.get(b.id()).is_none());
    }

    #[test]
    fn test_prune_keeps_newest_checkpoints() {
        let mut arena = SnapshotArena::new(false);
        let a = ProcessSnapshot::initial(&mut arena, 0, ContextHandle(0), LayoutHandle(0));
        let mut ids = Vec::new();
        for n in 0..3 {
            let mut s = a.derive_for_advance(&mut arena);
            s.set_checkpoint(CheckpointId(n));
            arena.retain(&s);
            ids.push(s.id());
        }
        // retained without a checkpoint: not counted, not pruned
        arena.retain(&a);

        assert_eq!(arena.prune_checkpoints(2), 1);
        assert_eq!(arena.checkpoints(), ids[1..].to_vec());
        assert!(arena.get(a.id()).is_some());
    }

    #[test]
    fn test_release_checkpoints_after_rewind_point() {
        let mut arena = SnapshotArena::new(false);
        let a = ProcessSnapshot::initial(&mut arena, 0, ContextHandle(0), LayoutHandle(0));
        let mut ids = Vec::new();
        for n in 0..3 {
            let mut s = a.derive_for_advance(&mut arena);
            s.set_checkpoint(CheckpointId(n));
            arena.retain(&s);
            ids.push(s.id());
        }

        assert_eq!(arena.release_checkpoints_after(ids[0]), 2);
        assert_eq!(arena.checkpoints(), vec![ids[0]]);

        let mut history = SnapshotArena::new(true);
        let b = ProcessSnapshot::initial(&mut history, 0, ContextHandle(0), LayoutHandle(0));
        let mut c = b.derive_for_advance(&mut history);
        c.set_checkpoint(CheckpointId(0));
        history.retain(&c);
        assert_eq!(history.release_checkpoints_after(b.id()), 0);
    }
}

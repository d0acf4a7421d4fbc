//! Produced surface: the committed event stream and its observers

use crate::error::{ProcessingError, Result};
use crate::layout::Placement;
use crate::state::{EventCode, ProcessSnapshot, SnapshotId};
use serde::{Deserialize, Serialize};

/// One accepted step in traversal order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedStep {
    pub snapshot: SnapshotId,
    pub event: EventCode,
    pub row_index: usize,
    pub data_item_index: usize,
    pub group_depth: usize,
    pub page_number: usize,
    pub placement: Placement,
    /// Step repeated by a pending-pages round
    pub deferred: bool,
}

impl CommittedStep {
    pub fn from_snapshot(snapshot: &ProcessSnapshot) -> Self {
        Self {
            snapshot: snapshot.id(),
            event: snapshot.event_code(),
            row_index: snapshot.row_index(),
            data_item_index: snapshot.data_item_index(),
            group_depth: snapshot.group_depth(),
            page_number: snapshot.page_number(),
            placement: snapshot.placement(),
            deferred: snapshot.handler().is_pending_pages(),
        }
    }

    /// Row step that did not fit; the row is advanced again on the next page
    pub fn is_retried(&self) -> bool {
        self.event == EventCode::ItemsAdvanced && self.placement == Placement::PageBreak
    }
}

/// Accepted steps of a run; truncated when a rollback discards steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStream {
    steps: Vec<CommittedStep>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: CommittedStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drop every step after the first `len`
    pub fn truncate(&mut self, len: usize) {
        self.steps.truncate(len);
    }

    pub fn steps(&self) -> &[CommittedStep] {
        &self.steps
    }

    /// Event codes in order, optionally without page bracketing and deferred repeats
    pub fn events(&self, include_pages: bool) -> Vec<EventCode> {
        self.steps
            .iter()
            .filter(|s| include_pages || (!s.event.is_page_event() && !s.deferred && !s.is_retried()))
            .map(|s| s.event)
            .collect()
    }

    /// Row indices of the row-advance steps that placed their row, in order
    pub fn rows(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| s.event == EventCode::ItemsAdvanced && !s.is_retried())
            .map(|s| s.row_index)
            .collect()
    }
}

/// Caller-side stage run between `advance` and `commit`
///
/// This is where rendering and I/O happen. An error aborts the run and is
/// returned unchanged.
pub trait StepObserver {
    fn observe(&mut self, snapshot: &ProcessSnapshot) -> Result<()>;
}

/// Observer that accepts every step
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn observe(&mut self, _snapshot: &ProcessSnapshot) -> Result<()> {
        Ok(())
    }
}

impl<F> StepObserver for F
where
    F: FnMut(&ProcessSnapshot) -> Result<()>,
{
    fn observe(&mut self, snapshot: &ProcessSnapshot) -> Result<()> {
        self(snapshot)
    }
}

/// Wall-clock bound checked between steps
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget_ms: u64,
    expires_at: u64,
}

impl Deadline {
    /// Deadline `budget_ms` milliseconds from now
    pub fn after_millis(budget_ms: u64) -> Self {
        Self {
            budget_ms,
            expires_at: current_timestamp().saturating_add(budget_ms),
        }
    }

    pub fn is_expired(&self) -> bool {
        current_timestamp() > self.expires_at
    }
}

impl StepObserver for Deadline {
    fn observe(&mut self, _snapshot: &ProcessSnapshot) -> Result<()> {
        if self.is_expired() {
            return Err(ProcessingError::DeadlineExceeded(self.budget_ms));
        }
        Ok(())
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as u64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(event: EventCode, row_index: usize, deferred: bool) -> CommittedStep {
        CommittedStep {
            snapshot: SnapshotId(row_index as u64),
            event,
            row_index,
            data_item_index: row_index,
            group_depth: 0,
            page_number: 1,
            placement: Placement::Placed,
            deferred,
        }
    }

    #[test]
    fn test_events_filter_page_bracketing() {
        let mut stream = EventStream::new();
        stream.push(step(EventCode::ReportStarted, 0, false));
        stream.push(step(EventCode::PageStarted, 0, false));
        stream.push(step(EventCode::PageStarted, 0, true));
        stream.push(step(EventCode::ItemsAdvanced, 0, false));
        stream.push(step(EventCode::ItemsAdvanced, 1, false));

        assert_eq!(stream.events(true).len(), 5);
        assert_eq!(
            stream.events(false),
            vec![EventCode::ReportStarted, EventCode::ItemsAdvanced, EventCode::ItemsAdvanced]
        );
        assert_eq!(stream.rows(), vec![0, 1]);

        stream.truncate(3);
        assert!(stream.rows().is_empty());
    }

    #[test]
    fn test_retried_row_listed_once() {
        let mut stream = EventStream::new();
        let mut broken = step(EventCode::ItemsAdvanced, 4, false);
        broken.placement = Placement::PageBreak;
        assert!(broken.is_retried());
        stream.push(broken);
        stream.push(step(EventCode::PageFinished, 4, false));
        stream.push(step(EventCode::PageStarted, 4, false));
        stream.push(step(EventCode::ItemsAdvanced, 4, false));

        assert_eq!(stream.rows(), vec![4]);
        assert_eq!(stream.events(false), vec![EventCode::ItemsAdvanced]);
    }

    #[test]
    fn test_step_serializes_camel_case() {
        let json = serde_json::to_string(&step(EventCode::GroupStarted, 2, false)).unwrap();
        assert!(json.contains("\"rowIndex\":2"));
        assert!(json.contains("\"event\":\"GroupStarted\""));
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let mut deadline = Deadline {
            budget_ms: 5,
            expires_at: 0,
        };
        assert!(deadline.is_expired());
        assert!(!Deadline::after_millis(60_000).is_expired());

        let mut arena = crate::state::SnapshotArena::new(false);
        let s = ProcessSnapshot::initial(
            &mut arena,
            0,
            crate::state::ContextHandle(0),
            crate::state::LayoutHandle(0),
        );
        assert_eq!(deadline.observe(&s), Err(ProcessingError::DeadlineExceeded(5)));
    }
}

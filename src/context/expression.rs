//! Expression context: the reference row context

use crate::context::{Function, RowContext, RowView};
use crate::data::{DataCursor, Value};
use crate::error::{ProcessingError, Result};
use crate::state::{CheckpointId, ContextHandle, ProcessSnapshot, ReportEvent};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

/// A stateless computation over the current row
///
/// Failures are reported as messages and become error markers in the
/// computed values; they never abort traversal.
pub trait Expression {
    fn evaluate(&self, row: &RowView<'_>) -> std::result::Result<Value, String>;
}

impl<F> Expression for F
where
    F: Fn(&RowView<'_>) -> std::result::Result<Value, String>,
{
    fn evaluate(&self, row: &RowView<'_>) -> std::result::Result<Value, String> {
        self(row)
    }
}

struct NamedExpression {
    name: String,
    expression: Box<dyn Expression>,
}

/// Row context backed by named expressions and stateful functions
pub struct ExpressionContext {
    handle: ContextHandle,
    expressions: Vec<NamedExpression>,
    functions: Vec<Box<dyn Function>>,
    /// Source values of the refreshed row
    row: Vec<Value>,
    computed: FxHashMap<String, Value>,
    checkpoints: VecDeque<(CheckpointId, Vec<Box<dyn Function>>)>,
    capacity: usize,
    next_checkpoint: u64,
}

impl Default for ExpressionContext {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ExpressionContext {
    /// Create a context keeping at most `capacity` checkpoints
    pub fn new(capacity: usize) -> Self {
        Self {
            handle: ContextHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            expressions: Vec::new(),
            functions: Vec::new(),
            row: Vec::new(),
            computed: FxHashMap::default(),
            checkpoints: VecDeque::new(),
            capacity: capacity.max(1),
            next_checkpoint: 0,
        }
    }

    pub fn with_expression(mut self, name: impl Into<String>, expression: impl Expression + 'static) -> Self {
        self.expressions.push(NamedExpression {
            name: name.into(),
            expression: Box::new(expression),
        });
        self
    }

    pub fn with_function(mut self, function: impl Function + 'static) -> Self {
        self.functions.push(Box::new(function));
        self
    }

    /// Number of checkpoints currently held
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    fn load_row(&mut self, data_item: usize, cursor: &dyn DataCursor) -> Result<()> {
        self.row.clear();
        // an empty source has no row to designate
        if data_item >= cursor.row_count() {
            return Ok(());
        }
        for column in 0..cursor.column_count() {
            self.row.push(cursor.value_at(data_item, column)?);
        }
        Ok(())
    }

    fn evaluate_expressions(&mut self, cursor: &dyn DataCursor) {
        let view = RowView::new(cursor, &self.row, &self.functions);
        for named in &self.expressions {
            let value = match named.expression.evaluate(&view) {
                Ok(value) => value,
                Err(message) => {
                    warn!(expression = %named.name, error = %message, "expression failed");
                    Value::Error(message)
                }
            };
            self.computed.insert(named.name.clone(), value);
        }
    }
}

impl RowContext for ExpressionContext {
    fn handle(&self) -> ContextHandle {
        self.handle
    }

    fn refresh(&mut self, snapshot: &ProcessSnapshot, cursor: &dyn DataCursor) -> Result<()> {
        self.load_row(snapshot.data_item_index(), cursor)?;
        self.evaluate_expressions(cursor);
        Ok(())
    }

    fn fire(&mut self, event: &ReportEvent, cursor: &dyn DataCursor) -> Result<()> {
        {
            let view = RowView::new(cursor, &self.row, &[]);
            for function in &mut self.functions {
                function.on_event(event, &view);
            }
        }
        // expressions may read function values
        self.evaluate_expressions(cursor);
        Ok(())
    }

    fn row_values(&self) -> &[Value] {
        &self.row
    }

    fn value(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.computed.get(name) {
            return Some(value.clone());
        }
        self.functions
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.value())
    }

    fn save_checkpoint(&mut self) -> CheckpointId {
        let id = CheckpointId(self.next_checkpoint);
        self.next_checkpoint += 1;
        self.checkpoints.push_back((id, self.functions.clone()));
        while self.checkpoints.len() > self.capacity {
            self.checkpoints.pop_front();
        }
        debug!(checkpoint = id.0, held = self.checkpoints.len(), "saved row context checkpoint");
        id
    }

    fn restore_checkpoint(&mut self, checkpoint: CheckpointId) -> Result<()> {
        match self.checkpoints.iter().position(|(id, _)| *id == checkpoint) {
            Some(position) => {
                // later checkpoints belong to discarded steps
                self.checkpoints.truncate(position + 1);
                self.functions = self.checkpoints[position].1.clone();
                debug!(checkpoint = checkpoint.0, "restored row context checkpoint");
                Ok(())
            }
            None if checkpoint.0 < self.next_checkpoint => {
                Err(ProcessingError::CheckpointEvicted(checkpoint.0))
            }
            None => Err(ProcessingError::DataAccess(format!(
                "checkpoint {} was never taken by this row context",
                checkpoint.0
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ItemCount, RunningSum};
    use crate::data::TableCursor;
    use crate::state::{EventCode, LayoutHandle, SnapshotArena};

    fn table() -> TableCursor {
        TableCursor::from_rows(
            ["name", "amount"],
            vec![
                [Value::from("a"), Value::from(4.0)],
                [Value::from("b"), Value::from(0.0)],
            ],
        )
    }

    fn snapshot_at(arena: &mut SnapshotArena, ctx: &ExpressionContext, item: usize) -> ProcessSnapshot {
        ProcessSnapshot::initial(arena, item, ctx.handle(), LayoutHandle(0))
    }

    fn items_advanced(row: usize) -> ReportEvent {
        ReportEvent {
            code: EventCode::ItemsAdvanced,
            row_index: row,
            data_item_index: row,
            group_level: None,
            page_number: 1,
        }
    }

    fn ratio(row: &RowView<'_>) -> std::result::Result<Value, String> {
        let amount = row.column("amount").and_then(Value::as_number).unwrap_or(0.0);
        if amount == 0.0 {
            return Err("division by zero".into());
        }
        Ok(Value::Number(100.0 / amount))
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let cursor = table();
        let mut arena = SnapshotArena::new(false);
        let mut ctx = ExpressionContext::default().with_expression("ratio", ratio);
        let s = snapshot_at(&mut arena, &ctx, 0);

        ctx.refresh(&s, &cursor).unwrap();
        let first = ctx.value("ratio");
        ctx.refresh(&s, &cursor).unwrap();
        assert_eq!(ctx.value("ratio"), first);
        assert_eq!(first, Some(Value::Number(25.0)));
        assert_eq!(ctx.row_values()[0], Value::from("a"));
    }

    #[test]
    fn test_expression_error_becomes_marker() {
        let cursor = table();
        let mut arena = SnapshotArena::new(false);
        let mut ctx = ExpressionContext::default().with_expression("ratio", ratio);
        let s = snapshot_at(&mut arena, &ctx, 1);

        assert!(ctx.refresh(&s, &cursor).is_ok());
        assert_eq!(ctx.value("ratio"), Some(Value::Error("division by zero".into())));
    }

    #[test]
    fn test_checkpoint_restore_rewinds_functions() {
        let cursor = table();
        let mut ctx = ExpressionContext::default()
            .with_function(ItemCount::new("count"))
            .with_function(RunningSum::new("sum", 1));
        let mut arena = SnapshotArena::new(false);
        let s = snapshot_at(&mut arena, &ctx, 0);
        ctx.refresh(&s, &cursor).unwrap();
        ctx.fire(&items_advanced(0), &cursor).unwrap();

        let checkpoint = ctx.save_checkpoint();
        ctx.fire(&items_advanced(0), &cursor).unwrap();
        assert_eq!(ctx.value("count"), Some(Value::Number(2.0)));

        ctx.restore_checkpoint(checkpoint).unwrap();
        assert_eq!(ctx.value("count"), Some(Value::Number(1.0)));
        assert_eq!(ctx.value("sum"), Some(Value::Number(4.0)));

        // a checkpoint can be replayed more than once
        ctx.fire(&items_advanced(0), &cursor).unwrap();
        ctx.restore_checkpoint(checkpoint).unwrap();
        assert_eq!(ctx.value("count"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_restore_discards_later_checkpoints() {
        let mut ctx = ExpressionContext::new(2);
        let outer = ctx.save_checkpoint();
        let inner = ctx.save_checkpoint();

        ctx.restore_checkpoint(outer).unwrap();
        assert_eq!(ctx.checkpoint_count(), 1);
        assert!(ctx.restore_checkpoint(inner).is_err());

        // the replayed inner checkpoint does not evict the outer one
        ctx.save_checkpoint();
        assert!(ctx.restore_checkpoint(outer).is_ok());
    }

    #[test]
    fn test_checkpoint_eviction() {
        let mut ctx = ExpressionContext::new(2);
        let first = ctx.save_checkpoint();
        ctx.save_checkpoint();
        ctx.save_checkpoint();
        assert_eq!(ctx.checkpoint_count(), 2);
        assert_eq!(
            ctx.restore_checkpoint(first),
            Err(ProcessingError::CheckpointEvicted(0))
        );
        assert!(ctx.restore_checkpoint(CheckpointId(99)).is_err());
    }

    #[test]
    fn test_contexts_have_distinct_handles() {
        assert_ne!(ExpressionContext::default().handle(), ExpressionContext::default().handle());
    }
}

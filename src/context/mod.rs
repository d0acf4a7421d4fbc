//! Row context: expression and function state for the current row

mod expression;
mod function;

pub use expression::{Expression, ExpressionContext};
pub use function::{Function, GroupCount, ItemCount, PageItemCount, RunningSum};

use crate::data::{DataCursor, Value};
use crate::error::Result;
use crate::state::{CheckpointId, ContextHandle, ProcessSnapshot, ReportEvent};

/// Live evaluation state for the row a snapshot designates
///
/// This is the one piece of shared mutable state in a run. Only the owner of
/// the active snapshot may refresh or restore it.
pub trait RowContext {
    fn handle(&self) -> ContextHandle;

    /// Recompute expressions for the snapshot's row; idempotent per row
    fn refresh(&mut self, snapshot: &ProcessSnapshot, cursor: &dyn DataCursor) -> Result<()>;

    /// Deliver a report event to stateful functions
    fn fire(&mut self, event: &ReportEvent, cursor: &dyn DataCursor) -> Result<()>;

    /// Source values of the current row
    fn row_values(&self) -> &[Value];

    /// Named expression or function result
    fn value(&self, name: &str) -> Option<Value>;

    /// Save function state so a replay can rewind to this point
    fn save_checkpoint(&mut self) -> CheckpointId;

    /// Rewind function state to a saved checkpoint
    fn restore_checkpoint(&mut self, checkpoint: CheckpointId) -> Result<()>;
}

/// Read access to the current row while evaluating
pub struct RowView<'a> {
    cursor: &'a dyn DataCursor,
    values: &'a [Value],
    functions: &'a [Box<dyn Function>],
}

impl<'a> RowView<'a> {
    pub fn new(
        cursor: &'a dyn DataCursor,
        values: &'a [Value],
        functions: &'a [Box<dyn Function>],
    ) -> Self {
        Self {
            cursor,
            values,
            functions,
        }
    }

    /// Value of a column by index
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    /// Value of a column by name
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.cursor
            .column_index(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Current value of a function, if visible from here
    pub fn function(&self, name: &str) -> Option<Value> {
        self.functions
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.value())
    }
}

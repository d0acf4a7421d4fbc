//! Stateful report functions driven by report events

use crate::context::RowView;
use crate::data::Value;
use crate::state::{EventCode, ReportEvent};
use std::fmt;

/// A function accumulating state across events
///
/// Functions are cloned into checkpoints, so a replay sees exactly the state
/// they had when the checkpoint was taken.
pub trait Function: fmt::Debug {
    fn name(&self) -> &str;

    fn on_event(&mut self, event: &ReportEvent, row: &RowView<'_>);

    fn value(&self) -> Value;

    fn boxed_clone(&self) -> Box<dyn Function>;
}

impl Clone for Box<dyn Function> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

fn resets(event: &ReportEvent, level: Option<usize>) -> bool {
    match event.code {
        EventCode::ReportStarted => true,
        EventCode::GroupStarted => level.is_some() && event.group_level == level,
        _ => false,
    }
}

/// Counts advanced rows, optionally restarting with each group occurrence
#[derive(Debug, Clone)]
pub struct ItemCount {
    name: String,
    reset_level: Option<usize>,
    count: u64,
}

impl ItemCount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reset_level: None,
            count: 0,
        }
    }

    /// Restart counting whenever the group at `level` starts
    pub fn per_group(mut self, level: usize) -> Self {
        self.reset_level = Some(level);
        self
    }
}

impl Function for ItemCount {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&mut self, event: &ReportEvent, _row: &RowView<'_>) {
        if resets(event, self.reset_level) {
            self.count = 0;
        } else if event.code == EventCode::ItemsAdvanced {
            self.count += 1;
        }
    }

    fn value(&self) -> Value {
        Value::Number(self.count as f64)
    }

    fn boxed_clone(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

/// Counts rows on the current page
#[derive(Debug, Clone)]
pub struct PageItemCount {
    name: String,
    count: u64,
}

impl PageItemCount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
        }
    }
}

impl Function for PageItemCount {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&mut self, event: &ReportEvent, _row: &RowView<'_>) {
        match event.code {
            EventCode::ReportStarted | EventCode::PageStarted => self.count = 0,
            EventCode::ItemsAdvanced => self.count += 1,
            _ => {}
        }
    }

    fn value(&self) -> Value {
        Value::Number(self.count as f64)
    }

    fn boxed_clone(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

/// Sums a numeric column over advanced rows; non-numeric cells are skipped
#[derive(Debug, Clone)]
pub struct RunningSum {
    name: String,
    column: usize,
    reset_level: Option<usize>,
    sum: f64,
}

impl RunningSum {
    pub fn new(name: impl Into<String>, column: usize) -> Self {
        Self {
            name: name.into(),
            column,
            reset_level: None,
            sum: 0.0,
        }
    }

    pub fn per_group(mut self, level: usize) -> Self {
        self.reset_level = Some(level);
        self
    }
}

impl Function for RunningSum {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&mut self, event: &ReportEvent, row: &RowView<'_>) {
        if resets(event, self.reset_level) {
            self.sum = 0.0;
        } else if event.code == EventCode::ItemsAdvanced {
            if let Some(n) = row.get(self.column).and_then(Value::as_number) {
                self.sum += n;
            }
        }
    }

    fn value(&self) -> Value {
        Value::Number(self.sum)
    }

    fn boxed_clone(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

/// Counts occurrences of the group at one level
#[derive(Debug, Clone)]
pub struct GroupCount {
    name: String,
    level: usize,
    count: u64,
}

impl GroupCount {
    pub fn new(name: impl Into<String>, level: usize) -> Self {
        Self {
            name: name.into(),
            level,
            count: 0,
        }
    }
}

impl Function for GroupCount {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&mut self, event: &ReportEvent, _row: &RowView<'_>) {
        match event.code {
            EventCode::ReportStarted => self.count = 0,
            EventCode::GroupStarted if event.group_level == Some(self.level) => self.count += 1,
            _ => {}
        }
    }

    fn value(&self) -> Value {
        Value::Number(self.count as f64)
    }

    fn boxed_clone(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TableCursor;

    fn event(code: EventCode, group_level: Option<usize>) -> ReportEvent {
        ReportEvent {
            code,
            row_index: 0,
            data_item_index: 0,
            group_level,
            page_number: 1,
        }
    }

    #[test]
    fn test_item_count_per_group() {
        let cursor = TableCursor::default();
        let row = RowView::new(&cursor, &[], &[]);
        let mut count = ItemCount::new("n").per_group(0);

        count.on_event(&event(EventCode::ItemsAdvanced, None), &row);
        count.on_event(&event(EventCode::ItemsAdvanced, None), &row);
        assert_eq!(count.value(), Value::Number(2.0));

        // inner group start does not reset an outer-level counter
        count.on_event(&event(EventCode::GroupStarted, Some(1)), &row);
        assert_eq!(count.value(), Value::Number(2.0));

        count.on_event(&event(EventCode::GroupStarted, Some(0)), &row);
        assert_eq!(count.value(), Value::Number(0.0));
    }

    #[test]
    fn test_page_item_count_resets_on_page_start() {
        let cursor = TableCursor::default();
        let row = RowView::new(&cursor, &[], &[]);
        let mut count = PageItemCount::new("page_rows");
        count.on_event(&event(EventCode::ItemsAdvanced, None), &row);
        count.on_event(&event(EventCode::PageStarted, None), &row);
        count.on_event(&event(EventCode::ItemsAdvanced, None), &row);
        assert_eq!(count.value(), Value::Number(1.0));
    }

    #[test]
    fn test_running_sum_skips_non_numeric() {
        let cursor = TableCursor::default();
        let mut sum = RunningSum::new("total", 0);
        for v in [Value::from(2.5), Value::from("n/a"), Value::from(4.0)] {
            let values = [v];
            let row = RowView::new(&cursor, &values, &[]);
            sum.on_event(&event(EventCode::ItemsAdvanced, None), &row);
        }
        assert_eq!(sum.value(), Value::Number(6.5));
    }

    #[test]
    fn test_boxed_clone_is_independent() {
        let cursor = TableCursor::default();
        let row = RowView::new(&cursor, &[], &[]);
        let mut original: Box<dyn Function> = Box::new(GroupCount::new("groups", 0));
        let saved = original.clone();
        original.on_event(&event(EventCode::GroupStarted, Some(0)), &row);
        assert_eq!(original.value(), Value::Number(1.0));
        assert_eq!(saved.value(), Value::Number(0.0));
    }
}

//! Mini-Report: a report-processing state machine
//!
//! This crate provides the traversal core of a paginating report engine:
//! - Immutable process snapshots chained through an arena
//! - A closed set of transition handlers with two-phase advance/commit
//! - Pending-pages deferral for queued page content
//! - Checkpoint replay when a layout pass rolls back

pub mod config;
pub mod context;
pub mod data;
pub mod driver;
pub mod error;
pub mod layout;
pub mod output;
pub mod state;
pub mod wasm;

// Re-export WASM types for direct use
pub use wasm::WasmReport;

// Re-export primary types
pub use config::{PageConstraints, ProcessingConfig};
pub use context::{Expression, ExpressionContext, Function, RowContext, RowView};
pub use data::{DataCursor, GroupDef, ReportStructure, RowStream, TableCursor, Value};
pub use driver::ReportProcessor;
pub use error::{ConfigError, ProcessingError, Result};
pub use layout::{LayoutProcess, PageLayout, PageLayouter, PaginationRules, Placement};
pub use output::{CommittedStep, Deadline, EventStream, NoopObserver, StepObserver};
pub use state::{EventCode, Handler, ProcessSnapshot, SnapshotId};

use context::{GroupCount, ItemCount, PageItemCount, RunningSum};
use serde::{Deserialize, Serialize};

/// Processor over the in-memory table with the reference collaborators
pub type Report = ReportProcessor<TableCursor, ExpressionContext, PageLayouter>;

/// Built-in function requested by a report definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunctionSpec {
    ItemCount {
        name: String,
        #[serde(default)]
        reset_level: Option<usize>,
    },
    PageItemCount {
        name: String,
    },
    RunningSum {
        name: String,
        column: String,
        #[serde(default)]
        reset_level: Option<usize>,
    },
    GroupCount {
        name: String,
        level: usize,
    },
}

impl FunctionSpec {
    fn install(&self, rows: ExpressionContext, data: &TableCursor) -> Result<ExpressionContext, ConfigError> {
        let rows = match self {
            FunctionSpec::ItemCount { name, reset_level } => {
                let mut f = ItemCount::new(name.as_str());
                if let Some(level) = reset_level {
                    f = f.per_group(*level);
                }
                rows.with_function(f)
            }
            FunctionSpec::PageItemCount { name } => rows.with_function(PageItemCount::new(name.as_str())),
            FunctionSpec::RunningSum {
                name,
                column,
                reset_level,
            } => {
                let index = data.column_index(column).ok_or_else(|| {
                    ConfigError::Invalid(format!("function '{}' sums unknown column '{}'", name, column))
                })?;
                let mut f = RunningSum::new(name.as_str(), index);
                if let Some(level) = reset_level {
                    f = f.per_group(*level);
                }
                rows.with_function(f)
            }
            FunctionSpec::GroupCount { name, level } => {
                rows.with_function(GroupCount::new(name.as_str(), *level))
            }
        };
        Ok(rows)
    }
}

/// A complete report input: data, structure, functions and settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportDefinition {
    pub data: TableCursor,
    pub structure: ReportStructure,
    pub functions: Vec<FunctionSpec>,
    /// Padded row stream; one row per data item when absent
    pub row_stream: Option<Vec<usize>>,
    pub config: ProcessingConfig,
}

impl ReportDefinition {
    /// Parse a report definition from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let definition: Self = serde_json::from_str(json)?;
        definition.config.validate()?;
        Ok(definition)
    }

    /// Build a processor with the expression context and page layouter
    pub fn build(self) -> Result<Report, ConfigError> {
        let data = self.data.normalized();
        let config = self.config;

        let mut rows = ExpressionContext::new(config.checkpoint_capacity);
        for function in &self.functions {
            rows = function.install(rows, &data)?;
        }
        let layout = PageLayouter::new(config.page, config.rules)
            .with_mark_capacity(config.checkpoint_capacity);

        let stream = self
            .row_stream
            .map(|items| RowStream::padded(items, &data))
            .transpose()?;
        let mut report = ReportProcessor::new(data, self.structure, rows, layout, config)?;
        if let Some(stream) = stream {
            report = report.with_row_stream(stream)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = r#"{
        "data": {
            "columns": ["region", "amount"],
            "rows": [["east", 10], ["east", 5], ["west", 7]]
        },
        "structure": { "groups": [{ "name": "region", "key_columns": [0] }] },
        "functions": [
            { "kind": "running_sum", "name": "total", "column": "amount" },
            { "kind": "item_count", "name": "per_region", "reset_level": 0 },
            { "kind": "group_count", "name": "regions", "level": 0 }
        ]
    }"#;

    #[test]
    fn test_parse_definition() {
        let definition = ReportDefinition::from_json(SALES).unwrap();
        assert_eq!(definition.data.row_count(), 3);
        assert_eq!(definition.structure.group_count(), 1);
        assert_eq!(definition.functions.len(), 3);
        assert_eq!(definition.config, ProcessingConfig::default());
    }

    #[test]
    fn test_build_and_run() {
        let mut report = ReportDefinition::from_json(SALES).unwrap().build().unwrap();
        let stream = report.run(&mut NoopObserver).unwrap();

        assert_eq!(stream.rows(), vec![0, 1, 2]);
        assert_eq!(report.rows().value("total"), Some(Value::Number(22.0)));
        assert_eq!(report.rows().value("per_region"), Some(Value::Number(1.0)));
        assert_eq!(report.rows().value("regions"), Some(Value::Number(2.0)));
        assert_eq!(report.layout().page_count(), 1);
    }

    #[test]
    fn test_unknown_sum_column_rejected() {
        let json = r#"{
            "data": { "columns": ["a"], "rows": [[1]] },
            "functions": [{ "kind": "running_sum", "name": "s", "column": "b" }]
        }"#;
        let err = ReportDefinition::from_json(json).unwrap().build().err().unwrap();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_row_stream_outside_data_rejected() {
        let json = r#"{
            "data": { "columns": ["a"], "rows": [[1]] },
            "row_stream": [0, 3]
        }"#;
        let err = ReportDefinition::from_json(json).unwrap().build().err().unwrap();
        assert!(matches!(
            err,
            ConfigError::Processing(ProcessingError::DataAccess(_))
        ));
    }
}

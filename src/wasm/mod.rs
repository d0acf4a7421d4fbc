//! WASM bindings for the report processor

use crate::layout::PageLayout;
use crate::output::{CommittedStep, NoopObserver};
use crate::{Report, ReportDefinition};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM-exposed report wrapper
#[wasm_bindgen]
pub struct WasmReport {
    report: Report,
}

#[wasm_bindgen]
impl WasmReport {
    /// Create a report from a JSON definition
    #[wasm_bindgen(constructor)]
    pub fn new(definition: &str) -> Result<WasmReport, JsValue> {
        Self::from_json(definition).map_err(|e| JsValue::from_str(&e))
    }

    /// Run the report; returns the committed steps and pages as JSON
    pub fn run(&mut self) -> Result<String, JsValue> {
        self.run_json().map_err(|e| JsValue::from_str(&e))
    }

    /// Get page count of the last run
    #[wasm_bindgen(js_name = getPageCount)]
    pub fn get_page_count(&self) -> usize {
        self.report.layout().page_count()
    }

    /// Get rollback count of the last run
    #[wasm_bindgen(js_name = getRollbackCount)]
    pub fn get_rollback_count(&self) -> usize {
        self.report.rollbacks()
    }
}

impl WasmReport {
    fn from_json(definition: &str) -> Result<Self, String> {
        let report = ReportDefinition::from_json(definition)
            .and_then(ReportDefinition::build)
            .map_err(|e| e.to_string())?;
        Ok(Self { report })
    }

    fn run_json(&mut self) -> Result<String, String> {
        let stream = self
            .report
            .run(&mut NoopObserver)
            .map_err(|e| e.to_string())?;
        let output = RunOutput {
            steps: stream.steps(),
            pages: self.report.layout().pages(),
            rollbacks: self.report.rollbacks(),
        };
        serde_json::to_string(&output).map_err(|e| e.to_string())
    }
}

/// Serializable run result for JS
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput<'a> {
    steps: &'a [CommittedStep],
    pages: &'a [PageLayout],
    rollbacks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_returns_json() {
        let mut report = WasmReport::from_json(
            r#"{ "data": { "columns": ["name"], "rows": [["a"], ["b"]] } }"#,
        )
        .unwrap();
        let json = report.run_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["pages"].as_array().map(|p| p.len()), Some(1));
        assert_eq!(value["rollbacks"], 0);
        assert_eq!(value["steps"][0]["event"], "ReportStarted");
        assert_eq!(report.get_page_count(), 1);
    }

    #[test]
    fn test_invalid_definition_reports_message() {
        let err = WasmReport::from_json(r#"{ "config": { "max_cycles": 0 } }"#)
            .err()
            .unwrap();
        assert!(err.contains("max_cycles"));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_wasm_report_runs() {
        let mut report =
            WasmReport::new(r#"{ "data": { "columns": ["name"], "rows": [["a"], ["b"]] } }"#)
                .unwrap();
        let json = report.run().unwrap();
        assert!(json.contains("\"rowIndex\":1"));
        assert_eq!(report.get_page_count(), 1);
        assert_eq!(report.get_rollback_count(), 0);
    }

    #[wasm_bindgen_test]
    fn test_wasm_report_rejects_invalid_definition() {
        assert!(WasmReport::new("not json").is_err());
    }
}

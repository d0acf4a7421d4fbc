//! Processing configuration

use crate::error::ConfigError;
use crate::layout::PaginationRules;
use serde::{Deserialize, Serialize};

/// Page geometry and band sizing used by the page layouter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConstraints {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    /// Height of one text line inside a band
    pub line_height: f32,
    /// Width of one character cell
    pub cell_width: f32,
    pub page_header_height: f32,
    pub page_footer_height: f32,
    pub report_header_height: f32,
    pub group_header_height: f32,
    pub group_footer_height: f32,
}

impl Default for PageConstraints {
    fn default() -> Self {
        Self {
            page_width: 612.0, // US Letter
            page_height: 792.0,
            margin_top: 72.0, // 1 inch
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
            line_height: 14.0,
            cell_width: 7.0,
            page_header_height: 20.0,
            page_footer_height: 20.0,
            report_header_height: 40.0,
            group_header_height: 18.0,
            group_footer_height: 18.0,
        }
    }
}

impl PageConstraints {
    /// Get usable content width
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// Get usable content height per page
    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Height available to body bands once the page footer is reserved
    pub fn body_height(&self) -> f32 {
        (self.content_height() - self.page_footer_height).max(0.0)
    }

    /// Number of character cells that fit on one line
    pub fn cells_per_line(&self) -> usize {
        if self.cell_width <= 0.0 {
            return usize::MAX;
        }
        ((self.content_width() / self.cell_width).floor() as usize).max(1)
    }
}

/// Settings for one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Upper bound on advance/commit cycles before the run is aborted
    pub max_cycles: usize,
    /// Retain every derived snapshot in the arena, not just checkpoints
    pub keep_history: bool,
    /// Row context checkpoints kept before the oldest is evicted
    pub checkpoint_capacity: usize,
    pub page: PageConstraints,
    pub rules: PaginationRules,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_cycles: 1_000_000,
            keep_history: false,
            checkpoint_capacity: 64,
            page: PageConstraints::default(),
            rules: PaginationRules::default(),
        }
    }
}

impl ProcessingConfig {
    /// Parse a configuration, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the processor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cycles == 0 {
            return Err(ConfigError::Invalid("max_cycles must be positive".into()));
        }
        if self.checkpoint_capacity == 0 {
            return Err(ConfigError::Invalid(
                "checkpoint_capacity must be positive".into(),
            ));
        }
        if self.page.body_height() <= 0.0 {
            return Err(ConfigError::Invalid(
                "page leaves no room for body content".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_constraints() {
        let page = PageConstraints::default();
        assert_eq!(page.content_width(), 468.0); // 612 - 72 - 72
        assert_eq!(page.content_height(), 648.0); // 792 - 72 - 72
        assert_eq!(page.body_height(), 628.0);
        assert_eq!(page.cells_per_line(), 66);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ProcessingConfig::from_json(r#"{ "max_cycles": 50, "page": { "page_height": 300.0 } }"#)
                .unwrap();
        assert_eq!(config.max_cycles, 50);
        assert_eq!(config.page.page_height, 300.0);
        assert_eq!(config.page.margin_top, 72.0);
        assert_eq!(config.checkpoint_capacity, 64);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ProcessingConfig::from_json(r#"{ "max_cycles": 0 }"#).is_err());
        assert!(ProcessingConfig::from_json(r#"{ "page": { "page_height": 100.0 } }"#).is_err());
        assert!(ProcessingConfig::from_json("not json").is_err());
    }
}

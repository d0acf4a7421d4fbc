//! Band measurement on a fixed cell grid

use crate::data::Value;
use unicode_linebreak::{linebreaks, BreakOpportunity};
use unicode_segmentation::UnicodeSegmentation;

/// Measures band heights by wrapping text into fixed-width cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMeasure {
    cells_per_line: usize,
    line_height: f32,
}

impl BandMeasure {
    pub fn new(cells_per_line: usize, line_height: f32) -> Self {
        Self {
            cells_per_line: cells_per_line.max(1),
            line_height,
        }
    }

    /// Lines needed to show `text` in a column `width` cells wide
    ///
    /// Breaks at Unicode line-break opportunities and falls back to breaking
    /// inside a word that is wider than the column.
    pub fn line_count(&self, text: &str, width: usize) -> usize {
        let width = width.max(1);
        if text.is_empty() {
            return 1;
        }

        let mut lines = 1;
        let mut used = 0;
        let mut start = 0;
        for (end, opportunity) in linebreaks(text) {
            let segment = &text[start..end];
            start = end;

            // trailing spaces may hang past the edge
            let visible = segment.trim_end().graphemes(true).count();
            let full = segment.graphemes(true).count();

            if used > 0 && used + visible > width {
                lines += 1;
                used = 0;
            }

            // emergency breaks inside an over-long word
            let extra = visible.saturating_sub(1) / width;
            lines += extra;
            used += full - extra * width;

            if matches!(opportunity, BreakOpportunity::Mandatory) && end < text.len() {
                lines += 1;
                used = 0;
            }
        }
        lines
    }

    /// Height of a row band laying its cells side by side in equal columns
    pub fn row_height(&self, values: &[Value]) -> f32 {
        if values.is_empty() {
            return self.line_height;
        }
        let column_width = (self.cells_per_line / values.len()).max(1);
        let lines = values
            .iter()
            .map(|v| self.line_count(&v.to_string(), column_width))
            .max()
            .unwrap_or(1);
        lines as f32 * self.line_height
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }
}

//! Pagination records and rules

use serde::{Deserialize, Serialize};

/// What a placed band renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandKind {
    ReportHeader,
    PageHeader,
    GroupHeader { level: usize },
    Row,
    GroupFooter { level: usize },
    PageFooter,
}

impl BandKind {
    /// Bands that belong to the page frame rather than the body
    pub fn is_page_chrome(&self) -> bool {
        matches!(self, BandKind::PageHeader | BandKind::PageFooter)
    }
}

/// A band placed on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBand {
    pub kind: BandKind,
    /// Stream row the band was produced for
    pub row_index: usize,
    /// Offset from the top of the content area
    pub y: f32,
    pub height: f32,
}

/// Layout information for a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Page number (1-based)
    pub page_number: usize,
    /// First row with a row band on this page
    pub start_row: Option<usize>,
    /// Last row with a row band on this page
    pub end_row: Option<usize>,
    pub bands: Vec<PlacedBand>,
}

impl PageLayout {
    /// Create a new, empty page
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            start_row: None,
            end_row: None,
            bands: Vec::new(),
        }
    }

    /// Record a placed band
    pub fn push(&mut self, band: PlacedBand) {
        if band.kind == BandKind::Row {
            self.start_row.get_or_insert(band.row_index);
            self.end_row = Some(band.row_index);
        }
        self.bands.push(band);
    }

    /// Check if this page shows a given row
    pub fn contains_row(&self, row: usize) -> bool {
        match (self.start_row, self.end_row) {
            (Some(start), Some(end)) => row >= start && row <= end,
            _ => false,
        }
    }

    /// Number of row bands on the page
    pub fn row_count(&self) -> usize {
        self.bands.iter().filter(|b| b.kind == BandKind::Row).count()
    }
}

/// Pagination rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationRules {
    /// Move group headers to the next page rather than leave them without a row
    pub keep_headers_with_rows: bool,
    /// Place a band that is taller than a page on an empty page anyway
    pub overflow_on_empty_page: bool,
}

impl Default for PaginationRules {
    fn default() -> Self {
        Self {
            keep_headers_with_rows: true,
            overflow_on_empty_page: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_band(row_index: usize) -> PlacedBand {
        PlacedBand {
            kind: BandKind::Row,
            row_index,
            y: 0.0,
            height: 14.0,
        }
    }

    #[test]
    fn test_page_layout_rows() {
        let mut page = PageLayout::new(1);
        page.push(PlacedBand {
            kind: BandKind::GroupHeader { level: 0 },
            row_index: 3,
            y: 0.0,
            height: 18.0,
        });
        assert!(!page.contains_row(3));

        page.push(row_band(3));
        page.push(row_band(4));
        page.push(row_band(5));

        assert!(page.contains_row(3));
        assert!(page.contains_row(5));
        assert!(!page.contains_row(6));
        assert_eq!(page.row_count(), 3);
        assert_eq!(page.start_row, Some(3));
    }
}

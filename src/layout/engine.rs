//! Page layouter: the reference layout process

use crate::config::PageConstraints;
use crate::context::RowContext;
use crate::error::{ProcessingError, Result};
use crate::layout::measure::BandMeasure;
use crate::layout::pagination::{BandKind, PageLayout, PaginationRules, PlacedBand};
use crate::layout::{LayoutProcess, Placement};
use crate::state::{EventCode, LayoutHandle, ProcessSnapshot, SnapshotId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

/// Content waiting to be placed
#[derive(Debug, Clone, PartialEq)]
struct Band {
    kind: BandKind,
    row_index: usize,
    height: f32,
}

/// Layouter state captured when a group header is about to be placed
#[derive(Debug, Clone)]
struct LayoutMark {
    pages_len: usize,
    current: Option<PageLayout>,
    used: f32,
    queued: VecDeque<Band>,
    header_chain: Option<HeaderChain>,
}

/// Group headers placed since the last row band
#[derive(Debug, Clone, Copy)]
struct HeaderChain {
    /// Committed snapshot the outermost header was advanced from
    checkpoint: SnapshotId,
    /// Whether the outermost header opened the page body
    at_page_top: bool,
}

/// Places one band per report event onto fixed-size pages
///
/// Content arriving while no page is open, or that does not fit, is queued
/// and flushed when the next page's pending round restarts layout.
pub struct PageLayouter {
    handle: LayoutHandle,
    constraints: PageConstraints,
    rules: PaginationRules,
    measure: BandMeasure,
    /// Finished pages
    pages: Vec<PageLayout>,
    /// Page currently open
    current: Option<PageLayout>,
    /// Body height used on the open page
    used: f32,
    queued: VecDeque<Band>,
    header_chain: Option<HeaderChain>,
    /// Rewind points keyed by the snapshot a group header was advanced from
    marks: VecDeque<(SnapshotId, LayoutMark)>,
    mark_capacity: usize,
    /// Header to push onto a fresh page when it is replayed
    force_break_for: Option<SnapshotId>,
}

impl PageLayouter {
    pub fn new(constraints: PageConstraints, rules: PaginationRules) -> Self {
        Self {
            handle: LayoutHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            measure: BandMeasure::new(constraints.cells_per_line(), constraints.line_height),
            constraints,
            rules,
            pages: Vec::new(),
            current: None,
            used: 0.0,
            queued: VecDeque::new(),
            header_chain: None,
            marks: VecDeque::new(),
            mark_capacity: 64,
            force_break_for: None,
        }
    }

    /// Keep at most `capacity` rewind points, oldest dropped first
    pub fn with_mark_capacity(mut self, capacity: usize) -> Self {
        self.mark_capacity = capacity.max(1);
        self
    }

    /// Finished pages, in order
    pub fn pages(&self) -> &[PageLayout] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn constraints(&self) -> &PageConstraints {
        &self.constraints
    }

    /// Bands waiting for a page
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    fn band(&self, kind: BandKind, row_index: usize, rows: &dyn RowContext) -> Band {
        let c = &self.constraints;
        let height = match kind {
            BandKind::ReportHeader => c.report_header_height,
            BandKind::PageHeader => c.page_header_height,
            BandKind::PageFooter => c.page_footer_height,
            BandKind::GroupHeader { .. } => c.group_header_height,
            BandKind::GroupFooter { .. } => c.group_footer_height,
            BandKind::Row => self.measure.row_height(rows.row_values()),
        };
        Band {
            kind,
            row_index,
            height,
        }
    }

    fn body_is_empty(&self) -> bool {
        self.current
            .as_ref()
            .map(|page| page.bands.iter().all(|b| b.kind.is_page_chrome()))
            .unwrap_or(true)
    }

    fn fits(&self, band: &Band) -> bool {
        self.used + band.height <= self.constraints.body_height()
            || (self.rules.overflow_on_empty_page && self.body_is_empty())
    }

    fn put(&mut self, band: Band) {
        if let Some(page) = self.current.as_mut() {
            page.push(PlacedBand {
                kind: band.kind,
                row_index: band.row_index,
                y: self.used,
                height: band.height,
            });
            self.used += band.height;
        }
    }

    /// A band that does not fit on an empty page body can never be placed
    fn ensure_placeable(&self, band: &Band) -> Result<()> {
        if self.current.is_some() && self.body_is_empty() && !self.fits(band) {
            return Err(ProcessingError::OversizedBand {
                kind: band.kind,
                row: band.row_index,
                height: band.height,
                available: self.constraints.body_height() - self.used,
            });
        }
        Ok(())
    }

    /// Place a band now if possible, otherwise queue it
    fn offer(&mut self, band: Band) -> Result<Placement> {
        if self.current.is_none() || !self.queued.is_empty() {
            self.queued.push_back(band);
            return Ok(Placement::Placed);
        }
        if self.fits(&band) {
            self.put(band);
            return Ok(Placement::Placed);
        }
        self.ensure_placeable(&band)?;
        debug!(kind = ?band.kind, row = band.row_index, used = self.used, "band overflows page");
        self.queued.push_back(band);
        Ok(Placement::PageBreak)
    }

    fn save_mark(&mut self, origin: SnapshotId) {
        let mark = LayoutMark {
            pages_len: self.pages.len(),
            current: self.current.clone(),
            used: self.used,
            queued: self.queued.clone(),
            header_chain: self.header_chain,
        };
        self.marks.retain(|(id, _)| *id != origin);
        self.marks.push_back((origin, mark));
        while self.marks.len() > self.mark_capacity {
            self.marks.pop_front();
        }
    }

    /// A header chain that must move with its first row, if any
    fn orphaned_chain(&self) -> Option<SnapshotId> {
        if !self.rules.keep_headers_with_rows {
            return None;
        }
        self.header_chain
            .as_ref()
            .filter(|chain| !chain.at_page_top)
            .map(|chain| chain.checkpoint)
    }

    fn place_group_header(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Result<Placement> {
        let level = snapshot.groups().last().map(|f| f.level).unwrap_or(0);
        let band = self.band(BandKind::GroupHeader { level }, snapshot.row_index(), rows);
        let origin = snapshot.predecessor().unwrap_or_default();
        self.save_mark(origin);

        if self.force_break_for.is_some() && self.force_break_for == snapshot.predecessor() {
            self.force_break_for = None;
            if self.current.is_some() && !self.body_is_empty() {
                debug!(row = snapshot.row_index(), "moving replayed group header to a new page");
                self.header_chain = None;
                self.queued.push_back(band);
                return Ok(Placement::PageBreak);
            }
        }

        let at_page_top = self.current.is_some() && self.body_is_empty();
        let placement = match self.offer(band)? {
            Placement::PageBreak => self.break_chain(),
            placement => {
                if self.current.is_some() && self.header_chain.is_none() {
                    self.header_chain = Some(HeaderChain {
                        checkpoint: origin,
                        at_page_top,
                    });
                }
                placement
            }
        };
        Ok(placement)
    }

    /// Page break that moves an orphaned header chain along, if there is one
    fn break_chain(&mut self) -> Placement {
        match self.orphaned_chain() {
            Some(checkpoint) => Placement::Rollback { checkpoint },
            None => {
                self.header_chain = None;
                Placement::PageBreak
            }
        }
    }

    /// Rows that do not fit are not queued; the row is advanced again on the
    /// next page so page-scoped functions see it there.
    fn place_row(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Result<Placement> {
        let band = self.band(BandKind::Row, snapshot.row_index(), rows);
        if self.current.is_some() && self.queued.is_empty() && !self.fits(&band) {
            self.ensure_placeable(&band)?;
            debug!(row = band.row_index, used = self.used, "row overflows page");
            return Ok(self.break_chain());
        }
        let placement = self.offer(band)?;
        self.header_chain = None;
        Ok(placement)
    }

    fn open_page(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Placement {
        self.current = Some(PageLayout::new(snapshot.page_number()));
        self.used = 0.0;
        self.header_chain = None;
        let header = self.band(BandKind::PageHeader, snapshot.row_index(), rows);
        self.put(header);
        if self.queued.is_empty() {
            Placement::Placed
        } else {
            Placement::Pending
        }
    }

    fn close_page(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Placement {
        let footer = self.band(BandKind::PageFooter, snapshot.row_index(), rows);
        if let Some(mut page) = self.current.take() {
            page.push(PlacedBand {
                kind: footer.kind,
                row_index: footer.row_index,
                y: self.constraints.body_height(),
                height: footer.height,
            });
            debug!(page = page.page_number, rows = page.row_count(), "page finished");
            self.pages.push(page);
        }
        self.used = 0.0;
        self.header_chain = None;
        if self.queued.is_empty() {
            Placement::Placed
        } else {
            Placement::PageBreak
        }
    }
}

impl LayoutProcess for PageLayouter {
    fn handle(&self) -> LayoutHandle {
        self.handle
    }

    fn place(&mut self, snapshot: &ProcessSnapshot, rows: &dyn RowContext) -> Result<Placement> {
        let row = snapshot.row_index();
        let placement = match snapshot.event_code() {
            EventCode::ReportStarted => {
                let band = self.band(BandKind::ReportHeader, row, rows);
                self.offer(band)?
            }
            EventCode::GroupStarted => self.place_group_header(snapshot, rows)?,
            EventCode::ItemsAdvanced => self.place_row(snapshot, rows)?,
            EventCode::GroupFinished => {
                self.header_chain = None;
                let level = snapshot.group_depth();
                let band = self.band(BandKind::GroupFooter { level }, row, rows);
                self.offer(band)?
            }
            EventCode::PageStarted => self.open_page(snapshot, rows),
            EventCode::PageFinished => self.close_page(snapshot, rows),
            EventCode::ReportFinished => {
                if !self.queued.is_empty() {
                    return Err(ProcessingError::InvalidTransition(format!(
                        "report finished with {} unplaced bands",
                        self.queued.len()
                    )));
                }
                Placement::Placed
            }
        };
        Ok(placement)
    }

    fn restart(&mut self, _snapshot: &ProcessSnapshot, _rows: &dyn RowContext) -> Result<Placement> {
        if self.current.is_none() {
            return Ok(Placement::Pending);
        }
        while let Some(band) = self.queued.front() {
            if !self.fits(band) {
                self.ensure_placeable(band)?;
                return Ok(Placement::PageBreak);
            }
            if let Some(band) = self.queued.pop_front() {
                self.put(band);
            }
        }
        Ok(Placement::Placed)
    }

    fn rollback(&mut self, checkpoint: &ProcessSnapshot) -> Result<()> {
        let id = checkpoint.id();
        let position = self
            .marks
            .iter()
            .position(|(origin, _)| *origin == id)
            .ok_or(ProcessingError::UnknownCheckpoint(id))?;
        // marks taken after this one belong to discarded steps
        let mut later = self.marks.split_off(position);
        let Some((_, mark)) = later.pop_front() else {
            return Err(ProcessingError::UnknownCheckpoint(id));
        };

        // an orphaned header chain is replayed onto a fresh page
        let orphaned = self.header_chain.map(|chain| chain.checkpoint) == Some(id);
        self.force_break_for = orphaned.then_some(id);

        self.pages.truncate(mark.pages_len);
        self.current = mark.current;
        self.used = mark.used;
        self.queued = mark.queued;
        self.header_chain = mark.header_chain;
        debug!(checkpoint = id.0, forced_break = orphaned, "layout rolled back");
        Ok(())
    }
}

//! Transition handlers: the phases of report traversal

use crate::error::{ProcessingError, Result};
use crate::layout::Placement;
use crate::state::pending;
use crate::state::{EventCode, GroupFrame, ProcessEnv, ProcessSnapshot};
use std::rc::Rc;
use tracing::trace;

/// Shared reference to a handler; snapshots share handlers until one changes
pub type HandlerRef = Rc<Handler>;

/// The state of the traversal state machine, reified as data
///
/// `advance` performs the phase's own event on a derived snapshot and leaves
/// the handler installed. `commit` derives again and installs the successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    ReportStart,
    GroupStart,
    RowAdvance,
    GroupFinish,
    /// Opens a page, then hands control to `resume`
    PageStart { resume: HandlerRef },
    /// Closes a page, then opens the next one before `resume`
    PageFinish { resume: HandlerRef },
    /// Terminal, absorbing
    ReportFinish,
    /// Defers `inner`'s commit by one advance/commit round
    PendingPages { inner: HandlerRef },
}

impl Handler {
    /// Wrap a handler for one deferred round
    pub fn pending_pages(inner: HandlerRef) -> Result<Handler> {
        if matches!(*inner, Handler::PendingPages { .. }) {
            return Err(ProcessingError::InvalidWrap(
                "pending pages handler cannot wrap another pending pages handler".into(),
            ));
        }
        Ok(Handler::PendingPages { inner })
    }

    pub fn is_finish(&self) -> bool {
        match self {
            Handler::ReportFinish => true,
            Handler::PendingPages { inner } => inner.is_finish(),
            _ => false,
        }
    }

    pub fn event_code(&self) -> EventCode {
        match self {
            Handler::ReportStart => EventCode::ReportStarted,
            Handler::GroupStart => EventCode::GroupStarted,
            Handler::RowAdvance => EventCode::ItemsAdvanced,
            Handler::GroupFinish => EventCode::GroupFinished,
            Handler::PageStart { .. } => EventCode::PageStarted,
            Handler::PageFinish { .. } => EventCode::PageFinished,
            Handler::ReportFinish => EventCode::ReportFinished,
            Handler::PendingPages { inner } => inner.event_code(),
        }
    }

    /// Whether this handler hands control back to a previously active one
    pub fn is_restore_handler(&self) -> bool {
        match self {
            Handler::PageStart { .. } | Handler::PageFinish { .. } => true,
            Handler::PendingPages { inner } => inner.is_restore_handler(),
            _ => false,
        }
    }

    /// Handler wrapped by a deferring or page-bracketing variant
    pub fn inner(&self) -> Option<&HandlerRef> {
        match self {
            Handler::PendingPages { inner } => Some(inner),
            Handler::PageStart { resume } | Handler::PageFinish { resume } => Some(resume),
            _ => None,
        }
    }

    pub fn is_pending_pages(&self) -> bool {
        matches!(self, Handler::PendingPages { .. })
    }

    /// Perform this phase's step
    pub fn advance(&self, snapshot: &ProcessSnapshot, env: &mut ProcessEnv<'_>) -> Result<ProcessSnapshot> {
        self.ensure_active(snapshot, env)?;
        if snapshot.is_finished() {
            return Err(ProcessingError::AdvancePastFinish(snapshot.id()));
        }

        let mut next = env.derive(snapshot);
        match self {
            Handler::ReportStart => {
                next.set_event(EventCode::ReportStarted);
                env.refresh_and_place(&mut next)?;
            }
            Handler::GroupStart => {
                let level = next.group_depth();
                if level >= env.structure.group_count() {
                    return Err(ProcessingError::InvalidTransition(format!(
                        "no group defined at level {}",
                        level
                    )));
                }
                next.push_group(GroupFrame {
                    level,
                    start_row: next.row_index(),
                });
                next.set_event(EventCode::GroupStarted);
                env.refresh_and_place(&mut next)?;
            }
            Handler::RowAdvance => {
                next.set_event(EventCode::ItemsAdvanced);
                env.refresh_and_place(&mut next)?;
            }
            Handler::GroupFinish => {
                if next.pop_group().is_none() {
                    return Err(ProcessingError::InvalidTransition(
                        "group finish without an open group".into(),
                    ));
                }
                next.set_event(EventCode::GroupFinished);
                env.refresh_and_place(&mut next)?;
            }
            Handler::PageStart { .. } => {
                next.start_page();
                next.set_event(EventCode::PageStarted);
                env.refresh_and_place(&mut next)?;
            }
            Handler::PageFinish { .. } => {
                next.set_event(EventCode::PageFinished);
                env.refresh_and_place(&mut next)?;
                next.close_page();
            }
            Handler::ReportFinish => {
                next.set_event(EventCode::ReportFinished);
                next.finish();
                env.refresh_and_place(&mut next)?;
            }
            Handler::PendingPages { .. } => return pending::advance(next, env),
        }

        trace!(
            snapshot = next.id().0,
            event = ?next.event_code(),
            row = next.row_index(),
            page = next.page_number(),
            placement = ?next.placement(),
            "advanced"
        );
        Ok(env.publish(next))
    }

    /// Finalize an accepted step and install the successor handler
    pub fn commit(&self, snapshot: &ProcessSnapshot, env: &mut ProcessEnv<'_>) -> Result<ProcessSnapshot> {
        self.ensure_active(snapshot, env)?;
        match self {
            Handler::PendingPages { inner } => return pending::commit(inner, snapshot, env),
            Handler::ReportFinish => {
                let next = env.derive(snapshot);
                return Ok(env.publish(next));
            }
            _ => {}
        }

        match snapshot.placement() {
            Placement::Pending => return pending::create(snapshot, env),
            Placement::Rollback { checkpoint } => {
                return Err(ProcessingError::InvalidTransition(format!(
                    "snapshot {:?} requested rollback to {:?}; it must be replayed, not committed",
                    snapshot.id(),
                    checkpoint
                )))
            }
            Placement::Placed | Placement::PageBreak => {}
        }

        let mut next = env.derive(snapshot);
        let mut successor = self.successor(snapshot.placement(), &mut next, env)?;

        // PageBreak on a page footer means content is still queued
        let closing_page = matches!(self, Handler::PageFinish { .. });
        if snapshot.placement() == Placement::PageBreak && !closing_page {
            successor = Rc::new(Handler::PageFinish { resume: successor });
        } else if successor.is_finish() && next.page_open() && !closing_page {
            successor = Rc::new(Handler::PageFinish { resume: successor });
        }

        if *successor == Handler::GroupStart {
            let checkpoint = env.rows.save_checkpoint();
            next.set_checkpoint(checkpoint);
        }

        next.install(successor);
        trace!(
            snapshot = next.id().0,
            handler = ?next.event_code(),
            row = next.row_index(),
            "committed"
        );
        let next = env.publish(next);
        if next.row_context().checkpoint.is_some() {
            env.arena.retain(&next);
        }
        Ok(next)
    }

    /// Variant-specific choice of the next handler; may move the row
    fn successor(
        &self,
        placement: Placement,
        next: &mut ProcessSnapshot,
        env: &ProcessEnv<'_>,
    ) -> Result<HandlerRef> {
        let handler = match self {
            Handler::ReportStart => {
                let first = if env.stream.is_empty() {
                    Handler::ReportFinish
                } else if env.structure.group_count() > 0 {
                    Handler::GroupStart
                } else {
                    Handler::RowAdvance
                };
                Handler::PageStart {
                    resume: Rc::new(first),
                }
            }
            Handler::GroupStart => {
                if next.group_depth() < env.structure.group_count() {
                    Handler::GroupStart
                } else {
                    Handler::RowAdvance
                }
            }
            // a row that did not fit is advanced again after the page break
            Handler::RowAdvance if placement == Placement::PageBreak => Handler::RowAdvance,
            Handler::RowAdvance => {
                let row = next.row_index();
                let following = row + 1;
                if following >= env.stream.len() {
                    Self::close_or_finish(next)
                } else if next.group_depth() > 0
                    && env.break_level(row, following)?.is_some()
                {
                    Handler::GroupFinish
                } else {
                    env.move_to_row(next, following)?;
                    Handler::RowAdvance
                }
            }
            Handler::GroupFinish => {
                let row = next.row_index();
                let following = row + 1;
                let depth = next.group_depth();
                if following >= env.stream.len() {
                    Self::close_or_finish(next)
                } else {
                    let level = env.break_level(row, following)?.unwrap_or(depth);
                    if depth > level {
                        Handler::GroupFinish
                    } else {
                        env.move_to_row(next, following)?;
                        Handler::GroupStart
                    }
                }
            }
            Handler::PageStart { resume } => return Ok(Rc::clone(resume)),
            Handler::PageFinish { resume } => {
                if resume.is_finish() && placement != Placement::PageBreak {
                    return Ok(Rc::clone(resume));
                }
                Handler::PageStart {
                    resume: Rc::clone(resume),
                }
            }
            Handler::ReportFinish | Handler::PendingPages { .. } => {
                return Err(ProcessingError::InvalidTransition(format!(
                    "{:?} has no successor",
                    self.event_code()
                )))
            }
        };
        Ok(Rc::new(handler))
    }

    fn close_or_finish(next: &ProcessSnapshot) -> Handler {
        if next.group_depth() > 0 {
            Handler::GroupFinish
        } else {
            Handler::ReportFinish
        }
    }

    fn ensure_active(&self, snapshot: &ProcessSnapshot, env: &ProcessEnv<'_>) -> Result<()> {
        if self != snapshot.handler() {
            return Err(ProcessingError::HandlerMismatch {
                snapshot: snapshot.id(),
                handler: self.event_code(),
                active: snapshot.handler().event_code(),
            });
        }
        if snapshot.row_context().context != env.rows.handle() {
            return Err(ProcessingError::ForeignCollaborator {
                snapshot: snapshot.id(),
                collaborator: "row context",
            });
        }
        if snapshot.layout_process() != env.layout.handle() {
            return Err(ProcessingError::ForeignCollaborator {
                snapshot: snapshot.id(),
                collaborator: "layout process",
            });
        }
        Ok(())
    }
}

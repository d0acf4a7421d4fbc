//! Pending-pages deferral
//!
//! A pending-pages round repeats the layout attempt for the current step
//! without moving the traversal, giving the layout process one more chance
//! to flush queued page content before the wrapped handler commits.

use crate::error::Result;
use crate::state::{Handler, HandlerRef, ProcessEnv, ProcessSnapshot};
use std::rc::Rc;
use tracing::debug;

/// Derive forward with the active handler wrapped for one deferred round
///
/// Wrapping is idempotent: a snapshot already governed by a pending-pages
/// handler is only derived forward.
pub fn create(snapshot: &ProcessSnapshot, env: &mut ProcessEnv<'_>) -> Result<ProcessSnapshot> {
    let mut next = env.derive(snapshot);
    if !snapshot.handler().is_pending_pages() {
        let wrapped = Handler::pending_pages(Rc::clone(snapshot.handler_ref()))?;
        next.install(Rc::new(wrapped));
    }
    debug!(
        snapshot = next.id().0,
        event = ?next.event_code(),
        page = next.page_number(),
        "deferring commit for pending pages"
    );
    Ok(env.publish(next))
}

/// Repeat the layout attempt for the same logical step
pub(crate) fn advance(mut next: ProcessSnapshot, env: &mut ProcessEnv<'_>) -> Result<ProcessSnapshot> {
    env.rows.refresh(&next, env.cursor)?;
    let placement = env.layout.restart(&next, &*env.rows)?;
    next.set_placement(placement);
    debug!(
        snapshot = next.id().0,
        placement = ?placement,
        "restarted layout for pending pages"
    );
    Ok(env.publish(next))
}

/// Reinstall the wrapped handler and let it commit
pub(crate) fn commit(
    inner: &HandlerRef,
    snapshot: &ProcessSnapshot,
    env: &mut ProcessEnv<'_>,
) -> Result<ProcessSnapshot> {
    let mut next = env.derive(snapshot);
    next.set_placement(snapshot.placement());
    next.install(Rc::clone(inner));
    let next = env.publish(next);
    inner.commit(&next, env)
}

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::session::SessionHandle;

/// A place in the host UI that shows at most one in-flight completion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The single translation panel.
    Panel,
    /// One inline annotation, keyed by its element id.
    Annotation(String),
    /// One editable input, keyed by its element id.
    Input(String),
    /// One paragraph in a full-page translation, keyed by its element id.
    Paragraph(String),
}

/// Switch-latest ownership of sessions per slot.
///
/// Occupying a slot cancels whatever session held it before, so a stale
/// session can never write into a slot after a newer one started.
#[derive(Clone, Default)]
pub struct SlotRegistry {
    sessions: Arc<DashMap<Slot, SessionHandle>>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handle` to `slot`, cancelling and returning the previous holder.
    pub fn occupy(&self, slot: Slot, handle: SessionHandle) -> Option<SessionHandle> {
        let previous = self.sessions.insert(slot.clone(), handle);
        if let Some(previous) = &previous {
            debug!(?slot, session_id = %previous.id(), "superseding session in slot");
            previous.cancel();
        }
        previous
    }

    /// Cancels and releases the session in `slot`, returning whether one was bound.
    pub fn cancel(&self, slot: &Slot) -> bool {
        match self.sessions.remove(slot) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// True while the session bound to `slot` has not reached a terminal state.
    pub fn is_active(&self, slot: &Slot) -> bool {
        self.sessions
            .get(slot)
            .is_some_and(|handle| handle.is_active())
    }

    /// Handle of the session currently bound to `slot`.
    pub fn get(&self, slot: &Slot) -> Option<SessionHandle> {
        self.sessions.get(slot).map(|entry| entry.value().clone())
    }

    /// Number of slots with an in-flight session.
    pub fn active(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    /// Drops bindings whose sessions have already ended.
    pub fn prune(&self) {
        self.sessions.retain(|_, handle| handle.is_active());
    }

    /// Cancels every bound session, e.g. when the page is torn down.
    pub fn cancel_all(&self) {
        let slots: Vec<Slot> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for slot in slots {
            self.cancel(&slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use crate::stream::SessionState;

    #[test]
    fn occupy_cancels_previous_holder() {
        let registry = SlotRegistry::new();
        let first = SessionHandle::detached();
        let second = SessionHandle::detached();

        assert!(registry.occupy(Slot::Panel, first.clone()).is_none());
        assert!(registry.is_active(&Slot::Panel));

        let previous = registry.occupy(Slot::Panel, second.clone());
        assert_eq!(previous.map(|h| h.id()), Some(first.id()));
        assert_eq!(first.state(), SessionState::Cancelled);
        assert!(second.is_active());
        assert_eq!(registry.get(&Slot::Panel).map(|h| h.id()), Some(second.id()));
    }

    #[test]
    fn slots_are_independent() {
        let registry = SlotRegistry::new();
        let a = SessionHandle::detached();
        let b = SessionHandle::detached();
        registry.occupy(Slot::Paragraph("p1".into()), a.clone());
        registry.occupy(Slot::Paragraph("p2".into()), b.clone());
        assert_eq!(registry.active(), 2);

        assert!(registry.cancel(&Slot::Paragraph("p1".into())));
        assert_eq!(a.state(), SessionState::Cancelled);
        assert!(b.is_active());
        assert!(!registry.cancel(&Slot::Paragraph("p1".into())));
    }

    #[test]
    fn cancel_all_and_prune() {
        let registry = SlotRegistry::new();
        let a = SessionHandle::detached();
        let b = SessionHandle::detached();
        registry.occupy(Slot::Input("q".into()), a.clone());
        registry.occupy(Slot::Annotation("w".into()), b.clone());

        a.cancel();
        registry.prune();
        assert!(registry.get(&Slot::Input("q".into())).is_none());
        assert_eq!(registry.active(), 1);

        registry.cancel_all();
        assert_eq!(b.state(), SessionState::Cancelled);
        assert_eq!(registry.active(), 0);
    }
}

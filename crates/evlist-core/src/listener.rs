//! Listener capability and the per-list registration set.

use std::fmt;
use std::sync::Arc;

use crate::change::ListEvent;

/// Observer of committed list changes.
///
/// Called synchronously on the committing thread while that thread still
/// holds the list's write lock. Implementations may read the list (the
/// read lock is reentrant for the writer) but must not block on another
/// thread that needs the same lock.
///
/// A listener may write to its own list or to another list of the same
/// category. The resulting event is delivered once the current one has
/// reached every listener, so all listeners see events in commit order.
pub trait ListEventListener<T>: Send + Sync {
    /// Receives one committed change event.
    fn list_changed(&self, event: &ListEvent<T>);
}

/// Adapts a closure into a [`ListEventListener`].
pub struct FnListener<F>(F);

impl<F> FnListener<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, F> ListEventListener<T> for FnListener<F>
where
    F: Fn(&ListEvent<T>) + Send + Sync,
{
    fn list_changed(&self, event: &ListEvent<T>) {
        (self.0)(event)
    }
}

/// Boxes a closure as a shareable listener.
pub fn listener_fn<T, F>(f: F) -> Arc<dyn ListEventListener<T>>
where
    T: 'static,
    F: Fn(&ListEvent<T>) + Send + Sync + 'static,
{
    Arc::new(FnListener::new(f))
}

/// Handle identifying one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Registration-ordered listener set.
pub(crate) struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<dyn ListEventListener<T>>)>,
}

impl<T> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, listener: Arc<dyn ListEventListener<T>>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Clones the current registrations so delivery can run unlocked.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ListEventListener<T>>> {
        self.entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

//! Transaction bracket that batches atomic operations into one event.
//!
//! The assembler is a small state machine driven by the owning list:
//!
//! ```text
//!  Idle --begin_event--> Accumulating(depth=1) --begin_event--> depth+1
//!  Accumulating --element_*--> Accumulating (operation appended)
//!  depth>1 --commit_event/discard_event--> depth-1 (outer bracket decides)
//!  depth=1 --commit_event--> Idle, one event delivered if anything pending
//!  depth=1 --discard_event--> Idle, pending operations dropped
//! ```
//!
//! Calling `commit_event`, `discard_event` or an `element_*` method while
//! idle is a [`ListError::ProtocolViolation`].
//!
//! Delivery happens after the internal state lock is released, so a
//! listener may open a new transaction on the same list from inside its
//! callback. That transaction's event is queued by the publisher and
//! reaches listeners after the current one, in commit order.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::change::{ListChange, ListEvent, ListId};
use crate::error::ListError;
use crate::listener::{ListEventListener, ListenerId, ListenerSet};
use crate::publisher::ListEventPublisher;

struct AssemblerState<T> {
    depth: usize,
    pending: Vec<ListChange<T>>,
}

/// Accumulates operations between `begin_event` and `commit_event` and
/// delivers them as one [`ListEvent`].
pub struct ListEventAssembler<T> {
    source: ListId,
    publisher: ListEventPublisher,
    state: Mutex<AssemblerState<T>>,
    listeners: RwLock<ListenerSet<T>>,
}

impl<T> ListEventAssembler<T> {
    /// Creates an idle assembler emitting events on behalf of `source`.
    pub fn new(source: ListId, publisher: ListEventPublisher) -> Self {
        Self {
            source,
            publisher,
            state: Mutex::new(AssemblerState {
                depth: 0,
                pending: Vec::new(),
            }),
            listeners: RwLock::new(ListenerSet::new()),
        }
    }

    /// The list this assembler emits events for.
    pub fn source(&self) -> ListId {
        self.source
    }

    /// The publisher events are delivered through.
    pub fn publisher(&self) -> &ListEventPublisher {
        &self.publisher
    }

    /// Opens a transaction, or nests inside the one already open.
    pub fn begin_event(&self) {
        let mut state = self.state.lock();
        state.depth += 1;
        trace!(source = %self.source, depth = state.depth, "begin list event");
    }

    /// Returns `true` while a transaction is open.
    pub fn is_accumulating(&self) -> bool {
        self.state.lock().depth > 0
    }

    /// Current nesting depth; 0 when idle.
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Number of operations recorded in the open transaction.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Appends one operation to the open transaction.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` when no transaction is open.
    pub fn record(&self, change: ListChange<T>) -> Result<(), ListError> {
        let mut state = self.state.lock();
        if state.depth == 0 {
            warn!(
                source = %self.source,
                kind = %change.kind(),
                "operation recorded outside a transaction"
            );
            return Err(ListError::ProtocolViolation("element change recorded without begin_event"));
        }
        state.pending.push(change);
        Ok(())
    }

    /// Records an insertion of `value` at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` when no transaction is open.
    pub fn element_inserted(&self, index: usize, value: T) -> Result<(), ListError> {
        self.record(ListChange::Insert { index, value })
    }

    /// Records the replacement of `old` by `new` at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` when no transaction is open.
    pub fn element_updated(&self, index: usize, old: T, new: T) -> Result<(), ListError> {
        self.record(ListChange::Update { index, old, new })
    }

    /// Records the removal of `old` from `index`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` when no transaction is open.
    pub fn element_deleted(&self, index: usize, old: T) -> Result<(), ListError> {
        self.record(ListChange::Delete { index, old })
    }

    /// Closes the innermost bracket without delivering. Closing the
    /// outermost one drops every pending operation.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` when no transaction is open.
    pub fn discard_event(&self) -> Result<(), ListError> {
        let mut state = self.state.lock();
        if state.depth == 0 {
            warn!(source = %self.source, "discard_event without begin_event");
            return Err(ListError::ProtocolViolation("discard_event without begin_event"));
        }
        state.depth -= 1;
        if state.depth == 0 {
            let dropped = state.pending.len();
            state.pending.clear();
            trace!(source = %self.source, dropped, "list transaction discarded");
        }
        Ok(())
    }

    /// Registers `listener`; it receives every later event.
    pub fn add_listener(&self, listener: Arc<dyn ListEventListener<T>>) -> ListenerId {
        let id = self.listeners.write().add(listener);
        debug!(source = %self.source, listener = %id, "list listener added");
        id
    }

    /// Removes a registration. Returns `false` if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(id);
        if removed {
            debug!(source = %self.source, listener = %id, "list listener removed");
        }
        removed
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl<T: Send + 'static> ListEventAssembler<T> {
    /// Closes the innermost bracket. Closing the outermost one delivers the
    /// pending operations as one event, unless there are none.
    ///
    /// Returns `true` if an event was committed. It has reached every
    /// listener by the time the outermost publish on this thread returns.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` when no transaction is open.
    pub fn commit_event(&self) -> Result<bool, ListError> {
        let changes = {
            let mut state = self.state.lock();
            if state.depth == 0 {
                warn!(source = %self.source, "commit_event without begin_event");
                return Err(ListError::ProtocolViolation("commit_event without begin_event"));
            }
            state.depth -= 1;
            if state.depth > 0 {
                return Ok(false);
            }
            std::mem::take(&mut state.pending)
        };

        if changes.is_empty() {
            trace!(source = %self.source, "transaction closed with no changes");
            return Ok(false);
        }

        let event = ListEvent::new(self.source, self.publisher.next_sequence(), changes);
        let listeners = self.listeners.read().snapshot();
        debug!(
            source = %self.source,
            sequence = event.sequence(),
            changes = event.len(),
            "list transaction committed"
        );
        self.publisher.publish(event, listeners);
        Ok(true)
    }

}

impl<T: Clone + Send + 'static> ListEventAssembler<T> {
    /// Re-emits an event produced elsewhere to this assembler's listeners,
    /// unchanged.
    ///
    /// If a transaction is open here, the event's operations are merged into
    /// it instead and delivered with the outer commit.
    ///
    /// Returns the number of listeners called before returning; 0 when the
    /// event was merged or queued behind a delivery in progress.
    pub fn forward_event(&self, event: &ListEvent<T>) -> usize {
        {
            let mut state = self.state.lock();
            if state.depth > 0 {
                state.pending.extend(event.changes().iter().cloned());
                return 0;
            }
        }
        let listeners = self.listeners.read().snapshot();
        self.publisher.publish(event.clone(), listeners)
    }
}

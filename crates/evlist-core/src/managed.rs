//! Host-managed list wrapping a delegate [`EventList`].
//!
//! A [`ManagedList`] is what a host persistence layer hands to application
//! code. Storage, locking and the transaction machinery belong to the
//! delegate; the managed list registers itself as one of the delegate's
//! listeners and re-emits every delegate event to its own listeners,
//! unchanged.
//!
//! While the host is loading the list, forwarding is suppressed so the
//! load never surfaces as a flood of inserts. A list created through
//! [`ManagedList::uninitialized`] stays silent until
//! [`end_initialization`](ManagedList::end_initialization) is called; a
//! list created through [`ManagedList::wrap`] starts out initialized.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::assembler::ListEventAssembler;
use crate::change::{ListEvent, ListId};
use crate::error::ListError;
use crate::list::{EventList, ListReader, ListWriter};
use crate::listener::{ListEventListener, ListenerId};
use crate::lock::ListLock;
use crate::publisher::ListEventPublisher;

struct ManagedShared<T> {
    updates: ListEventAssembler<T>,
    initializing: AtomicBool,
    initialized: AtomicBool,
}

impl<T> ManagedShared<T> {
    fn forwarding_enabled(&self) -> bool {
        self.initialized.load(Ordering::Acquire) && !self.initializing.load(Ordering::Acquire)
    }
}

/// Listener installed on the delegate. Holds the managed side weakly so
/// the delegate never keeps a dropped managed list alive.
struct Forwarder<T> {
    target: Weak<ManagedShared<T>>,
}

impl<T: Clone + Send + Sync + 'static> ListEventListener<T> for Forwarder<T> {
    fn list_changed(&self, event: &ListEvent<T>) {
        let Some(shared) = self.target.upgrade() else {
            return;
        };
        if !shared.forwarding_enabled() {
            trace!(
                source = %event.source(),
                sequence = event.sequence(),
                "event suppressed during initialization"
            );
            return;
        }
        shared.updates.forward_event(event);
    }
}

/// A list whose storage lives in a delegate [`EventList`] and whose events
/// are forwarded to its own listeners.
pub struct ManagedList<T> {
    id: ListId,
    delegate: Arc<EventList<T>>,
    shared: Arc<ManagedShared<T>>,
    registration: Mutex<Option<ListenerId>>,
}

impl<T: Clone + Send + Sync + 'static> ManagedList<T> {
    /// Wraps an existing list. The result is initialized: delegate events
    /// are forwarded right away.
    pub fn wrap(delegate: Arc<EventList<T>>) -> Self {
        Self::attach(delegate, true)
    }

    /// Wraps a freshly created list that the host is about to load. Events
    /// are suppressed until [`end_initialization`](Self::end_initialization).
    pub fn uninitialized(delegate: Arc<EventList<T>>) -> Self {
        Self::attach(delegate, false)
    }

    fn attach(delegate: Arc<EventList<T>>, initialized: bool) -> Self {
        let id = ListId::next();
        let shared = Arc::new(ManagedShared {
            updates: ListEventAssembler::new(id, delegate.publisher().clone()),
            initializing: AtomicBool::new(false),
            initialized: AtomicBool::new(initialized),
        });
        let forwarder: Arc<dyn ListEventListener<T>> = Arc::new(Forwarder {
            target: Arc::downgrade(&shared),
        });
        let registration = delegate.add_listener(forwarder);
        debug!(managed = %id, delegate = %delegate.id(), initialized, "managed list attached");
        Self {
            id,
            delegate,
            shared,
            registration: Mutex::new(Some(registration)),
        }
    }

    /// Loads `snapshot` into the empty delegate without emitting events.
    /// Must be called between `begin_initialization` and
    /// `end_initialization`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` outside initialization and
    /// `ListError::InvalidArgument` if the delegate is not empty.
    pub fn inject_loaded_state<I>(&self, snapshot: I) -> Result<usize, ListError>
    where
        I: IntoIterator<Item = T>,
    {
        if !self.is_initializing() {
            return Err(ListError::ProtocolViolation(
                "loaded state injected outside initialization",
            ));
        }
        self.delegate.bulk_load(snapshot)
    }

    /// Replaces the contents with `target` under the write lock. See
    /// [`ListWriter::update_all`].
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn update_all(&self, target: &[T]) -> Result<bool, ListError>
    where
        T: PartialEq,
    {
        self.delegate.write().update_all(target)
    }

    /// Replaces the contents with `target` under the write lock, comparing
    /// elements with `same`. See [`ListWriter::update_all_by`].
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn update_all_by<F>(&self, target: &[T], same: F) -> Result<bool, ListError>
    where
        F: Fn(&T, &T) -> bool,
    {
        self.delegate.write().update_all_by(target, same)
    }
}

impl<T> ManagedList<T> {
    /// This managed list's id.
    pub fn id(&self) -> ListId {
        self.id
    }

    /// The wrapped list.
    pub fn delegate(&self) -> &Arc<EventList<T>> {
        &self.delegate
    }

    /// The delegate's lock.
    pub fn lock(&self) -> &ListLock {
        self.delegate.lock()
    }

    /// The delegate's publisher, which this list also delivers through.
    pub fn publisher(&self) -> &ListEventPublisher {
        self.delegate.publisher()
    }

    /// Acquires the delegate's read lock.
    pub fn read(&self) -> ListReader<'_, T> {
        self.delegate.read()
    }

    /// Acquires the delegate's write lock. Mutations made through it reach
    /// this list's listeners through the forwarder.
    pub fn write(&self) -> ListWriter<'_, T>
    where
        T: Send + 'static,
    {
        self.delegate.write()
    }

    /// Registers a listener on this managed list.
    pub fn add_listener(&self, listener: Arc<dyn ListEventListener<T>>) -> ListenerId {
        self.shared.updates.add_listener(listener)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.updates.remove_listener(id)
    }

    /// Number of listeners registered on this managed list.
    pub fn listener_count(&self) -> usize {
        self.shared.updates.listener_count()
    }

    /// Signals that the host starts loading this list.
    pub fn begin_initialization(&self) {
        self.shared.initializing.store(true, Ordering::Release);
        trace!(managed = %self.id, "initialization started");
    }

    /// Signals that loading is complete. Later delegate events are forwarded.
    pub fn end_initialization(&self) {
        self.shared.initialized.store(true, Ordering::Release);
        self.shared.initializing.store(false, Ordering::Release);
        trace!(managed = %self.id, "initialization finished");
    }

    /// Returns `true` while the host is loading this list.
    pub fn is_initializing(&self) -> bool {
        self.shared.initializing.load(Ordering::Acquire)
    }

    /// Returns `true` once the list has been initialized.
    pub fn was_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    /// Detaches from the delegate; no further events are forwarded.
    /// Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        match self.registration.lock().take() {
            Some(id) => {
                self.delegate.remove_listener(id);
                debug!(managed = %self.id, delegate = %self.delegate.id(), "managed list disposed");
                true
            }
            None => false,
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.registration.lock().is_none()
    }
}

impl<T> Drop for ManagedList<T> {
    fn drop(&mut self) {
        if let Some(id) = self.registration.get_mut().take() {
            self.delegate.remove_listener(id);
        }
    }
}

impl<T> fmt::Debug for ManagedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedList")
            .field("id", &self.id)
            .field("delegate", &self.delegate.id())
            .field("initializing", &self.is_initializing())
            .field("initialized", &self.was_initialized())
            .finish()
    }
}

//! Change publisher shared by the lists of one category.
//!
//! A publisher is the ordering domain for change events: every event
//! committed through it receives the next sequence number, and delivery
//! to listeners happens through [`ListEventPublisher::publish`]. Lists
//! sharing one publisher (and one [`ListLock`](crate::ListLock)) therefore
//! produce events numbered in the order their transactions committed.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::trace;

use crate::change::ListEvent;
use crate::listener::ListEventListener;

/// One event bound to the listeners it goes to.
type Delivery = Box<dyn FnOnce(&PublisherInner) + Send>;

#[derive(Default)]
struct DeliveryState {
    /// Thread currently delivering through this publisher.
    owner: Option<ThreadId>,
    /// Events committed by `owner` while it was delivering.
    queue: VecDeque<Delivery>,
}

#[derive(Default)]
struct PublisherInner {
    /// Last sequence number handed out.
    sequence: AtomicU64,
    /// Events delivered, including forwarded re-emissions.
    events_published: AtomicU64,
    /// Individual listener callbacks made.
    deliveries: AtomicU64,
    delivery: Mutex<DeliveryState>,
}

impl PublisherInner {
    fn deliver<T>(&self, event: &ListEvent<T>, listeners: &[Arc<dyn ListEventListener<T>>]) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        for listener in listeners {
            listener.list_changed(event);
        }
        self.deliveries.fetch_add(listeners.len() as u64, Ordering::Relaxed);

        trace!(
            source = %event.source(),
            sequence = event.sequence(),
            changes = event.len(),
            listeners = listeners.len(),
            "list event published"
        );
    }
}

/// Hands delivery back when the draining thread leaves `publish`, also
/// when a listener panics.
struct DrainGuard<'a> {
    inner: &'a PublisherInner,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.delivery.lock();
        state.owner = None;
        if !state.queue.is_empty() {
            trace!(
                dropped = state.queue.len(),
                "queued list events dropped after a listener panic"
            );
            state.queue.clear();
        }
    }
}

/// Shared handle to a change publisher.
#[derive(Clone, Default)]
pub struct ListEventPublisher {
    inner: Arc<PublisherInner>,
}

impl ListEventPublisher {
    /// Creates a new, unshared publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next sequence number.
    pub(crate) fn next_sequence(&self) -> u64 {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Delivers `event` to each listener in order, synchronously.
    ///
    /// A publish made on the thread that is already delivering through this
    /// publisher (a listener committing to its own list, or to another list
    /// of the category) is queued. The outermost publish drains the queue
    /// before it returns, so every listener sees the events in the order
    /// they were committed. A publish from any other thread delivers
    /// straight away; ordering between threads comes from the shared list
    /// lock.
    ///
    /// Returns the number of listeners called before returning, 0 when the
    /// event was queued.
    pub fn publish<T>(
        &self,
        event: ListEvent<T>,
        listeners: Vec<Arc<dyn ListEventListener<T>>>,
    ) -> usize
    where
        T: Send + 'static,
    {
        let me = thread::current().id();
        let count = listeners.len();
        let delivery: Delivery =
            Box::new(move |inner: &PublisherInner| inner.deliver(&event, &listeners));

        {
            let mut state = self.inner.delivery.lock();
            let owner = state.owner;
            match owner {
                Some(owner) if owner == me => {
                    state.queue.push_back(delivery);
                    trace!(queued = state.queue.len(), "list event queued behind delivery");
                    return 0;
                }
                Some(_) => {
                    drop(state);
                    delivery(&self.inner);
                    return count;
                }
                None => state.owner = Some(me),
            }
        }

        let _drain = DrainGuard { inner: &self.inner };
        delivery(&self.inner);
        while let Some(queued) = self.next_queued() {
            queued(&self.inner);
        }
        count
    }

    fn next_queued(&self) -> Option<Delivery> {
        self.inner.delivery.lock().queue.pop_front()
    }

    /// The most recently assigned sequence number (0 before any commit).
    pub fn last_sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    /// Total number of events published, including forwarded ones.
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }

    /// Total number of listener callbacks made.
    pub fn deliveries(&self) -> u64 {
        self.inner.deliveries.load(Ordering::Relaxed)
    }

    /// Returns `true` if both handles refer to the same publisher.
    pub fn same_publisher(&self, other: &ListEventPublisher) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ListEventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListEventPublisher")
            .field("last_sequence", &self.last_sequence())
            .field("events_published", &self.events_published())
            .finish()
    }
}

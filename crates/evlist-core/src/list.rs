//! The observable list.
//!
//! [`EventList`] owns the element storage and a change assembler. It is
//! read through a [`ListReader`] (holding the read lock) and mutated
//! through a [`ListWriter`] (holding the write lock). Every writer mutator
//! is one transaction: begin, mutate storage, record the matching
//! operations, commit. Listeners are called once per outermost commit,
//! after storage already reflects the change.
//!
//! The lock and publisher are handles. Lists built from clones of the same
//! handles form one category: their writers exclude each other and their
//! events share one sequence.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::assembler::ListEventAssembler;
use crate::change::{ListChange, ListId};
use crate::error::ListError;
use crate::listener::{ListEventListener, ListenerId};
use crate::lock::{ListLock, ReadGuard, WriteGuard};
use crate::publisher::ListEventPublisher;
use crate::reconcile::reconcile;

/// Initial storage capacity used by [`EventList::new`].
pub const DEFAULT_CAPACITY: usize = 10;

/// Observable, transactionally batched list.
pub struct EventList<T> {
    id: ListId,
    lock: ListLock,
    data: RwLock<Vec<T>>,
    updates: ListEventAssembler<T>,
}

impl<T> EventList<T> {
    /// Creates an empty list with its own lock and publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty, pre-sized list with its own lock and publisher.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_handles(capacity, ListLock::new(), ListEventPublisher::new())
    }

    /// Creates an empty list using existing lock and publisher handles.
    #[must_use]
    pub fn with_handles(lock: ListLock, publisher: ListEventPublisher) -> Self {
        Self::with_capacity_and_handles(DEFAULT_CAPACITY, lock, publisher)
    }

    /// Creates an empty, pre-sized list using existing handles.
    #[must_use]
    pub fn with_capacity_and_handles(
        capacity: usize,
        lock: ListLock,
        publisher: ListEventPublisher,
    ) -> Self {
        let id = ListId::next();
        Self {
            id,
            lock,
            data: RwLock::new(Vec::with_capacity(capacity)),
            updates: ListEventAssembler::new(id, publisher),
        }
    }

    /// This list's id, as carried by its events.
    pub fn id(&self) -> ListId {
        self.id
    }

    /// The read/write lock guarding this list.
    pub fn lock(&self) -> &ListLock {
        &self.lock
    }

    /// The publisher this list's events go through.
    pub fn publisher(&self) -> &ListEventPublisher {
        self.updates.publisher()
    }

    /// Acquires the read lock.
    pub fn read(&self) -> ListReader<'_, T> {
        ListReader {
            list: self,
            _guard: self.lock.read(),
        }
    }

    /// Registers a listener for this list's change events.
    pub fn add_listener(&self, listener: Arc<dyn ListEventListener<T>>) -> ListenerId {
        self.updates.add_listener(listener)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.updates.remove_listener(id)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.updates.listener_count()
    }

    /// Populates an empty list directly from `snapshot`.
    ///
    /// No transaction is opened and no event is emitted: an initial load
    /// must be invisible to listeners. Takes the write lock for the
    /// duration of the load.
    ///
    /// Returns the number of elements loaded.
    ///
    /// # Errors
    ///
    /// Returns `ListError::InvalidArgument` if the list is not empty.
    pub fn bulk_load<I>(&self, snapshot: I) -> Result<usize, ListError>
    where
        I: IntoIterator<Item = T>,
    {
        let _guard = self.lock.write();
        let mut data = self.data.write();
        if !data.is_empty() {
            return Err(ListError::InvalidArgument(format!(
                "bulk load requires an empty list, {} holds {} elements",
                self.id,
                data.len()
            )));
        }
        data.extend(snapshot);
        debug!(list = %self.id, loaded = data.len(), "list bulk loaded");
        Ok(data.len())
    }

    fn len_inner(&self) -> usize {
        self.data.read().len()
    }

    fn with_slice_inner<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.data.read())
    }
}

impl<T: Send + 'static> EventList<T> {
    /// Acquires the write lock.
    pub fn write(&self) -> ListWriter<'_, T> {
        ListWriter {
            list: self,
            _guard: self.lock.write(),
            opened: Cell::new(0),
        }
    }

    /// Acquires the write lock if that is possible without blocking.
    pub fn try_write(&self) -> Option<ListWriter<'_, T>> {
        self.lock.try_write().map(|guard| ListWriter {
            list: self,
            _guard: guard,
            opened: Cell::new(0),
        })
    }
}

impl<T: Clone> EventList<T> {
    fn get_inner(&self, index: usize) -> Result<T, ListError> {
        let data = self.data.read();
        data.get(index)
            .cloned()
            .ok_or_else(|| ListError::out_of_range(index, data.len()))
    }
}

impl<T> Default for EventList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventList")
            .field("id", &self.id)
            .field("len", &self.data.try_read().map(|data| data.len()))
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Read access to an [`EventList`], holding its read lock.
pub struct ListReader<'a, T> {
    list: &'a EventList<T>,
    _guard: ReadGuard,
}

impl<T> ListReader<'_, T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.list.len_inner()
    }

    /// Returns `true` if the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` over the current contents.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.list.with_slice_inner(f)
    }
}

impl<T: Clone> ListReader<'_, T> {
    /// Element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<T, ListError> {
        self.list.get_inner(index)
    }

    /// Copies the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.with_slice(<[T]>::to_vec)
    }

    /// Iterates over a copy of the current contents.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }
}

impl<T: PartialEq> ListReader<'_, T> {
    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.with_slice(|data| data.iter().position(|v| v == value))
    }

    /// Returns `true` if some element equals `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }
}

impl<T> fmt::Debug for ListReader<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListReader").field("list", &self.list.id).finish()
    }
}

/// Write access to an [`EventList`], holding its write lock.
///
/// Writers are reentrant: a thread that already holds the lock (through
/// another writer, a category-wide [`WriteGuard`], or inside a listener
/// callback) can open another writer without blocking.
pub struct ListWriter<'a, T: Send + 'static> {
    list: &'a EventList<T>,
    _guard: WriteGuard,
    /// Brackets opened through `begin_event` and not yet closed.
    opened: Cell<usize>,
}

impl<T: Send + 'static> ListWriter<'_, T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.list.len_inner()
    }

    /// Returns `true` if the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` over the current contents.
    ///
    /// The contents stay borrowed while `f` runs: a mutator called from
    /// inside `f` fails with `ListError::ProtocolViolation` and changes
    /// nothing.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.list.with_slice_inner(f)
    }

    /// Opens an outer transaction. Every mutator called until the matching
    /// [`commit_event`](Self::commit_event) joins it, and listeners see a
    /// single event.
    pub fn begin_event(&self) {
        self.list.updates.begin_event();
        self.opened.set(self.opened.get() + 1);
    }

    /// Closes a bracket opened with [`begin_event`](Self::begin_event).
    /// Returns `true` if an event was committed.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` if no transaction is open.
    pub fn commit_event(&self) -> Result<bool, ListError> {
        let delivered = self.list.updates.commit_event()?;
        self.opened.set(self.opened.get().saturating_sub(1));
        Ok(delivered)
    }

    /// Closes a bracket without delivering. Closing the outermost bracket
    /// drops the pending operations; storage changes already made stay.
    ///
    /// # Errors
    ///
    /// Returns `ListError::ProtocolViolation` if no transaction is open.
    pub fn discard_event(&self) -> Result<(), ListError> {
        self.list.updates.discard_event()?;
        self.opened.set(self.opened.get().saturating_sub(1));
        Ok(())
    }

    /// Runs `f` inside one transaction and commits whatever it recorded,
    /// even when `f` fails, so listeners never miss an applied change.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or `ListError::ProtocolViolation` if `f`
    /// left the transaction unbalanced.
    pub fn batch<R>(
        &self,
        f: impl FnOnce(&Self) -> Result<R, ListError>,
    ) -> Result<R, ListError> {
        self.begin_event();
        let result = f(self);
        self.commit_event()?;
        result
    }

    /// Runs one transaction: `f` mutates storage and reports the
    /// operations it performed, which are then recorded and committed.
    /// A transaction that reports nothing is discarded.
    ///
    /// The write lock is held, so the storage cell can only be busy if this
    /// thread is still borrowing it through `with_slice`.
    fn transact<R>(
        &self,
        f: impl FnOnce(&mut Vec<T>, &mut Vec<ListChange<T>>) -> R,
    ) -> Result<R, ListError> {
        let Some(mut data) = self.list.data.try_write() else {
            warn!(list = %self.list.id, "list mutated while its contents are borrowed");
            return Err(ListError::ProtocolViolation("list mutated from inside with_slice"));
        };
        let mut changes = Vec::new();
        let result = f(&mut data, &mut changes);
        drop(data);
        let updates = &self.list.updates;
        updates.begin_event();
        if changes.is_empty() {
            updates.discard_event()?;
        } else {
            for change in changes {
                updates.record(change)?;
            }
            updates.commit_event()?;
        }
        Ok(result)
    }
}

impl<T: Clone + Send + 'static> ListWriter<'_, T> {
    /// Element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<T, ListError> {
        self.list.get_inner(index)
    }

    /// Copies the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.with_slice(<[T]>::to_vec)
    }

    /// Appends `value`.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn push(&self, value: T) -> Result<(), ListError> {
        self.transact(|data, changes| {
            let index = data.len();
            data.push(value.clone());
            changes.push(ListChange::Insert { index, value });
        })
    }

    /// Inserts `value` at `index`, shifting later elements right.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if `index > len()`.
    pub fn insert(&self, index: usize, value: T) -> Result<(), ListError> {
        self.check_insert_index(index)?;
        self.transact(|data, changes| {
            data.insert(index, value.clone());
            changes.push(ListChange::Insert { index, value });
        })
    }

    /// Replaces the element at `index`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if `index >= len()`.
    pub fn set(&self, index: usize, value: T) -> Result<T, ListError> {
        self.check_element_index(index)?;
        self.transact(|data, changes| {
            let old = std::mem::replace(&mut data[index], value.clone());
            changes.push(ListChange::Update {
                index,
                old: old.clone(),
                new: value,
            });
            old
        })
    }

    /// Removes and returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if `index >= len()`.
    pub fn remove(&self, index: usize) -> Result<T, ListError> {
        self.check_element_index(index)?;
        self.transact(|data, changes| {
            let old = data.remove(index);
            changes.push(ListChange::Delete {
                index,
                old: old.clone(),
            });
            old
        })
    }

    /// Inserts `values` at `index` in iteration order, contiguously.
    ///
    /// An empty `values` opens no transaction. Returns whether anything
    /// was inserted.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if `index > len()`.
    pub fn insert_all<I>(&self, index: usize, values: I) -> Result<bool, ListError>
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            return Ok(false);
        }
        self.check_insert_index(index)?;
        self.transact(|data, changes| {
            for (offset, value) in values.into_iter().enumerate() {
                let at = index + offset;
                data.insert(at, value.clone());
                changes.push(ListChange::Insert { index: at, value });
            }
        })?;
        Ok(true)
    }

    /// Appends `values` in iteration order. Returns whether anything was
    /// appended.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn extend<I>(&self, values: I) -> Result<bool, ListError>
    where
        I: IntoIterator<Item = T>,
    {
        self.insert_all(self.len(), values)
    }

    /// Removes every element. Each removal is recorded as a delete at
    /// index 0, the position every element collapses into as the ones
    /// before it go. A no-op on an empty list.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn clear(&self) -> Result<bool, ListError> {
        if self.is_empty() {
            return Ok(false);
        }
        self.transact(|data, changes| {
            for old in data.drain(..) {
                changes.push(ListChange::Delete { index: 0, old });
            }
        })?;
        Ok(true)
    }

    /// Replaces the contents with `target`, recording only positional
    /// differences, compared with `PartialEq`. See
    /// [`update_all_by`](Self::update_all_by).
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn update_all(&self, target: &[T]) -> Result<bool, ListError>
    where
        T: PartialEq,
    {
        self.update_all_by(target, |a, b| a == b)
    }

    /// Replaces the contents with `target` as one transaction.
    ///
    /// Index `i` is left alone when `same(current[i], target[i])` holds and
    /// recorded as an update otherwise; extra target elements become
    /// trailing inserts and surplus current elements trailing deletes. An
    /// empty `target` is a no-op. Nothing is delivered when nothing
    /// differs.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn update_all_by<F>(&self, target: &[T], same: F) -> Result<bool, ListError>
    where
        F: Fn(&T, &T) -> bool,
    {
        if target.is_empty() {
            return Ok(false);
        }
        let changed = self.transact(|data, changes| reconcile(data, target, same, changes))?;
        debug!(list = %self.list.id, target_len = target.len(), changed, "list reconciled");
        Ok(changed)
    }
}

impl<T: Clone + PartialEq + Send + 'static> ListWriter<'_, T> {
    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.with_slice(|data| data.iter().position(|v| v == value))
    }

    /// Returns `true` if some element equals `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// Removes the first element equal to `value`. Returns `false`, with no
    /// event, if there is none.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn remove_item(&self, value: &T) -> Result<bool, ListError> {
        match self.index_of(value) {
            Some(index) => {
                self.remove(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every element equal to some member of `values`, as one
    /// transaction. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn remove_all(&self, values: &[T]) -> Result<bool, ListError> {
        self.transact(|data, changes| {
            for value in values {
                while let Some(index) = data.iter().position(|v| v == value) {
                    let old = data.remove(index);
                    changes.push(ListChange::Delete { index, old });
                }
            }
            !changes.is_empty()
        })
    }

    /// Removes every element not equal to some member of `values`, as one
    /// transaction. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn retain_all(&self, values: &[T]) -> Result<bool, ListError> {
        self.transact(|data, changes| {
            let mut index = 0;
            while index < data.len() {
                if values.contains(&data[index]) {
                    index += 1;
                } else {
                    let old = data.remove(index);
                    changes.push(ListChange::Delete { index, old });
                }
            }
            !changes.is_empty()
        })
    }
}

impl<T: Send + 'static> ListWriter<'_, T> {
    fn check_insert_index(&self, index: usize) -> Result<(), ListError> {
        let len = self.len();
        if index > len {
            return Err(ListError::out_of_range(index, len));
        }
        Ok(())
    }

    fn check_element_index(&self, index: usize) -> Result<(), ListError> {
        let len = self.len();
        if index >= len {
            return Err(ListError::out_of_range(index, len));
        }
        Ok(())
    }
}

impl<T: Send + 'static> Drop for ListWriter<'_, T> {
    fn drop(&mut self) {
        // Brackets closed through another writer on this thread are gone.
        let open = self.opened.get().min(self.list.updates.depth());
        if open == 0 {
            return;
        }
        let updates = &self.list.updates;
        if std::thread::panicking() {
            warn!(list = %self.list.id, open, "writer dropped while panicking; discarding");
            for _ in 0..open {
                if updates.discard_event().is_err() {
                    break;
                }
            }
            return;
        }
        warn!(list = %self.list.id, open, "writer dropped with open transactions; committing");
        for _ in 0..open {
            if let Err(err) = updates.commit_event() {
                warn!(list = %self.list.id, error = %err, "failed to close transaction on drop");
                break;
            }
        }
    }
}

impl<T: Send + 'static> fmt::Debug for ListWriter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListWriter")
            .field("list", &self.list.id)
            .field("opened", &self.opened.get())
            .finish()
    }
}

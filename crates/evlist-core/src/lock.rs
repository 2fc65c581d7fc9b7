//! Reentrant read/write lock shared by the lists of one category.
//!
//! A [`ListLock`] is a cheap, cloneable handle. Every clone refers to the
//! same lock, so lists constructed with clones of one handle serialize
//! their writes against each other. The lock lives as long as its
//! longest-lived holder.
//!
//! # Semantics
//!
//! - Any number of threads may hold the read lock at once.
//! - The write lock is exclusive against readers and other writers.
//! - Both locks are reentrant per thread: a thread holding the write lock
//!   may acquire the write lock again, or the read lock, without blocking.
//! - A thread holding only the read lock must not request the write lock.
//!   Upgrading blocks forever, exactly like a non-upgradable RW lock.
//! - Waiting writers take precedence over new readers, except readers that
//!   already hold the lock on their own thread.
//!
//! Guards release on drop and are tied to the acquiring thread.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct LockState {
    /// Thread currently owning the write lock.
    writer: Option<ThreadId>,
    /// Reentrant hold count of `writer`.
    write_holds: usize,
    /// Read hold counts per thread.
    readers: HashMap<ThreadId, usize>,
    /// Writers blocked in `write()`.
    waiting_writers: usize,
}

impl LockState {
    fn can_read(&self, me: ThreadId) -> bool {
        match self.writer {
            Some(owner) => owner == me,
            None => self.waiting_writers == 0 || self.readers.contains_key(&me),
        }
    }

    fn can_write(&self, me: ThreadId) -> bool {
        match self.writer {
            Some(owner) => owner == me,
            None => self.readers.is_empty(),
        }
    }

    fn acquire_read(&mut self, me: ThreadId) {
        *self.readers.entry(me).or_insert(0) += 1;
    }

    fn acquire_write(&mut self, me: ThreadId) {
        self.writer = Some(me);
        self.write_holds += 1;
    }
}

struct LockInner {
    state: Mutex<LockState>,
    changed: Condvar,
}

/// Shared handle to a reentrant read/write lock.
#[derive(Clone)]
pub struct ListLock {
    inner: Arc<LockInner>,
}

impl ListLock {
    /// Creates a new, unshared lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LockInner {
                state: Mutex::new(LockState::default()),
                changed: Condvar::new(),
            }),
        }
    }

    /// Acquires the read lock, blocking until no other thread writes.
    pub fn read(&self) -> ReadGuard {
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        while !state.can_read(me) {
            self.inner.changed.wait(&mut state);
        }
        state.acquire_read(me);
        ReadGuard {
            lock: self.clone(),
            _thread_bound: PhantomData,
        }
    }

    /// Acquires the read lock if that is possible without blocking.
    pub fn try_read(&self) -> Option<ReadGuard> {
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        if !state.can_read(me) {
            return None;
        }
        state.acquire_read(me);
        Some(ReadGuard {
            lock: self.clone(),
            _thread_bound: PhantomData,
        })
    }

    /// Acquires the write lock, blocking until every other holder releases.
    pub fn write(&self) -> WriteGuard {
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        if !state.can_write(me) {
            if state.writer.is_none() && state.readers.contains_key(&me) {
                tracing::warn!(
                    "write lock requested while holding the read lock; this blocks forever"
                );
            }
            state.waiting_writers += 1;
            while !state.can_write(me) {
                self.inner.changed.wait(&mut state);
            }
            state.waiting_writers -= 1;
        }
        state.acquire_write(me);
        WriteGuard {
            lock: self.clone(),
            _thread_bound: PhantomData,
        }
    }

    /// Acquires the write lock if that is possible without blocking.
    pub fn try_write(&self) -> Option<WriteGuard> {
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        if !state.can_write(me) {
            return None;
        }
        state.acquire_write(me);
        Some(WriteGuard {
            lock: self.clone(),
            _thread_bound: PhantomData,
        })
    }

    /// Returns `true` if the calling thread owns the write lock.
    pub fn is_write_held_by_current_thread(&self) -> bool {
        self.inner.state.lock().writer == Some(thread::current().id())
    }

    /// Returns `true` if the calling thread holds the read lock.
    pub fn is_read_held_by_current_thread(&self) -> bool {
        self.inner
            .state
            .lock()
            .readers
            .contains_key(&thread::current().id())
    }

    /// Returns `true` if both handles refer to the same lock.
    pub fn same_lock(&self, other: &ListLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn release_read(&self) {
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        if let Some(count) = state.readers.get_mut(&me) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&me);
            }
        }
        drop(state);
        self.inner.changed.notify_all();
    }

    fn release_write(&self) {
        let mut state = self.inner.state.lock();
        state.write_holds = state.write_holds.saturating_sub(1);
        if state.write_holds == 0 {
            state.writer = None;
        }
        drop(state);
        self.inner.changed.notify_all();
    }
}

impl Default for ListLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ListLock")
            .field("writer", &state.writer)
            .field("write_holds", &state.write_holds)
            .field("reader_threads", &state.readers.len())
            .finish()
    }
}

/// RAII guard for one hold of the read lock.
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard {
    lock: ListLock,
    _thread_bound: PhantomData<*const ()>,
}

impl ReadGuard {
    /// The lock this guard holds.
    pub fn lock(&self) -> &ListLock {
        &self.lock
    }
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl fmt::Debug for ReadGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard").finish_non_exhaustive()
    }
}

/// RAII guard for one hold of the write lock.
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard {
    lock: ListLock,
    _thread_bound: PhantomData<*const ()>,
}

impl WriteGuard {
    /// The lock this guard holds.
    pub fn lock(&self) -> &ListLock {
        &self.lock
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

impl fmt::Debug for WriteGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard").finish_non_exhaustive()
    }
}

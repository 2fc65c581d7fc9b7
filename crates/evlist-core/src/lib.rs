//! Observable, transactionally batched list engine.
//!
//! The core of `evlist` is [`EventList`], a mutable ordered collection
//! whose mutations are published to listeners as discrete change events.
//!
//! # Building blocks
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ListLock`] | Reentrant read/write lock, shareable across lists |
//! | [`ListEventPublisher`] | Ordering domain and delivery path for events |
//! | [`ListEventAssembler`] | Begin/commit bracket batching operations into one [`ListEvent`] |
//! | [`EventList`] | The list: storage plus an assembler |
//! | [`ManagedList`] | Host-facing wrapper forwarding a delegate's events |
//!
//! # Transactions
//!
//! Every mutator on [`ListWriter`] is one transaction and produces at most
//! one event. Callers can widen a transaction with
//! [`ListWriter::begin_event`] / [`ListWriter::commit_event`] (or
//! [`ListWriter::batch`]); nested brackets coalesce and only the outermost
//! commit delivers.
//!
//! # Reconciliation
//!
//! [`ListWriter::update_all`] replaces the contents with a target snapshot,
//! recording only positional differences. See [`reconcile`].
//!
//! # Locking
//!
//! Reads go through [`EventList::read`], writes through
//! [`EventList::write`]. Lists constructed from clones of one lock and one
//! publisher form a category: a writer on any of them excludes readers and
//! writers on all of them, and their events are numbered in commit order.
//!
//! ```rust
//! use evlist_core::{listener_fn, EventList, ListEvent};
//!
//! let list = EventList::new();
//! list.add_listener(listener_fn(|event: &ListEvent<u32>| {
//!     println!("{} changes", event.len());
//! }));
//!
//! let writer = list.write();
//! writer.extend([1, 2, 3]).unwrap();
//! assert!(writer.update_all(&[1, 9, 3]).unwrap());
//! assert_eq!(writer.to_vec(), vec![1, 9, 3]);
//! ```

mod assembler;
mod change;
mod error;
mod list;
mod listener;
mod lock;
mod managed;
mod publisher;
pub mod reconcile;

pub use assembler::ListEventAssembler;
pub use change::{ChangeKind, ListChange, ListEvent, ListId};
pub use error::ListError;
pub use list::{EventList, ListReader, ListWriter, DEFAULT_CAPACITY};
pub use listener::{listener_fn, FnListener, ListEventListener, ListenerId};
pub use lock::{ListLock, ReadGuard, WriteGuard};
pub use managed::ManagedList;
pub use publisher::ListEventPublisher;
pub use reconcile::same_arc;

#[cfg(test)]
mod tests;

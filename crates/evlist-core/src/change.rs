//! Atomic list operations and the change events that batch them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ListError;

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one list instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(u64);

impl ListId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "list-{}", self.0)
    }
}

/// The kind of an atomic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// An element was inserted.
    Insert,
    /// An element was replaced in place.
    Update,
    /// An element was removed.
    Delete,
}

impl ChangeKind {
    /// Returns the canonical label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic operation recorded inside a transaction.
///
/// `index` refers to the list as it was at the moment the operation was
/// recorded, after every earlier operation of the same event was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ListChange<T> {
    /// `value` was inserted at `index`; later elements shifted right.
    Insert {
        /// Position of the new element.
        index: usize,
        /// The inserted value.
        value: T,
    },
    /// The element at `index` was replaced.
    Update {
        /// Position of the replaced element.
        index: usize,
        /// Value before the update.
        old: T,
        /// Value after the update.
        new: T,
    },
    /// The element at `index` was removed; later elements shifted left.
    Delete {
        /// Position of the removed element.
        index: usize,
        /// The removed value.
        old: T,
    },
}

impl<T> ListChange<T> {
    /// Position this operation applies to.
    pub fn index(&self) -> usize {
        match self {
            Self::Insert { index, .. }
            | Self::Update { index, .. }
            | Self::Delete { index, .. } => *index,
        }
    }

    /// The kind of this operation.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert { .. } => ChangeKind::Insert,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }
}

impl<T: Clone> ListChange<T> {
    /// Applies this operation to `list`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if the index does not fit `list`.
    pub fn apply_to(&self, list: &mut Vec<T>) -> Result<(), ListError> {
        let len = list.len();
        match self {
            Self::Insert { index, value } => {
                if *index > len {
                    return Err(ListError::out_of_range(*index, len));
                }
                list.insert(*index, value.clone());
            }
            Self::Update { index, new, .. } => {
                let slot = list
                    .get_mut(*index)
                    .ok_or_else(|| ListError::out_of_range(*index, len))?;
                *slot = new.clone();
            }
            Self::Delete { index, .. } => {
                if *index >= len {
                    return Err(ListError::out_of_range(*index, len));
                }
                list.remove(*index);
            }
        }
        Ok(())
    }
}

/// An immutable batch of atomic operations from one committed transaction.
///
/// # Replay contract
///
/// Insertions and deletions shift every later index, so the operations are
/// only meaningful when applied strictly in order, each against the state
/// left by the previous one, starting from the list contents as they were
/// when the transaction began. [`ListEvent::replay`] does exactly that.
///
/// A committed event is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEvent<T> {
    source: ListId,
    sequence: u64,
    changes: Vec<ListChange<T>>,
}

impl<T> ListEvent<T> {
    pub(crate) fn new(source: ListId, sequence: u64, changes: Vec<ListChange<T>>) -> Self {
        debug_assert!(!changes.is_empty(), "list events are never empty");
        Self {
            source,
            sequence,
            changes,
        }
    }

    /// The list whose transaction produced this event.
    pub fn source(&self) -> ListId {
        self.source
    }

    /// Publisher-assigned sequence number. Events sharing a publisher are
    /// numbered in commit order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The recorded operations, in recording order.
    pub fn changes(&self) -> &[ListChange<T>] {
        &self.changes
    }

    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Always `false` for committed events.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterates over the recorded operations.
    pub fn iter(&self) -> std::slice::Iter<'_, ListChange<T>> {
        self.changes.iter()
    }

    /// Consumes the event, returning its operations.
    pub fn into_changes(self) -> Vec<ListChange<T>> {
        self.changes
    }

    /// Counts operations of the given kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }
}

impl<T: Clone> ListEvent<T> {
    /// Replays every operation, in order, onto `base`.
    ///
    /// `base` must hold the list contents as of transaction start; on
    /// success it holds the contents as of commit.
    ///
    /// # Errors
    ///
    /// Returns `ListError::IndexOutOfRange` if an operation does not fit,
    /// which means `base` was not the pre-transaction state.
    pub fn replay(&self, base: &mut Vec<T>) -> Result<(), ListError> {
        for change in &self.changes {
            change.apply_to(base)?;
        }
        Ok(())
    }
}

impl<'a, T> IntoIterator for &'a ListEvent<T> {
    type Item = &'a ListChange<T>;
    type IntoIter = std::slice::Iter<'a, ListChange<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

//! Collection-type adapter used by a host persistence layer.
//!
//! [`CollectionType`] is the seam a host framework calls into: it
//! instantiates lists (for loading or for new entities), wraps existing
//! ones, answers membership queries, and merges one list into another
//! with [`replace_elements`](CollectionType::replace_elements).

use std::sync::Arc;

use evlist_core::{EventList, ListError, ManagedList};
use tracing::debug;

use crate::factory::{DefaultListFactory, ListFactory};

/// Host-facing adapter for list-valued properties.
pub struct CollectionType<T> {
    factory: Arc<dyn ListFactory<T>>,
}

impl<T> CollectionType<T> {
    /// Creates an adapter that builds lists with `factory`.
    pub fn new(factory: Arc<dyn ListFactory<T>>) -> Self {
        Self { factory }
    }

    /// The factory lists are built with.
    pub fn factory(&self) -> &Arc<dyn ListFactory<T>> {
        &self.factory
    }

    /// Creates an empty list. A `None` size hint uses the factory's default
    /// capacity.
    pub fn instantiate(&self, anticipated_size: Option<usize>) -> EventList<T> {
        match anticipated_size {
            Some(size) => self.factory.create_list_with_capacity(size),
            None => self.factory.create_list(),
        }
    }
}

impl<T> Default for CollectionType<T> {
    fn default() -> Self {
        Self::new(Arc::new(DefaultListFactory::default()))
    }
}

impl<T: Clone + Send + Sync + 'static> CollectionType<T> {
    /// Creates an empty managed list that the host is about to load; it
    /// stays silent until the host ends initialization.
    pub fn instantiate_managed(&self) -> ManagedList<T> {
        ManagedList::uninitialized(Arc::new(self.factory.create_list()))
    }

    /// Wraps an existing list so that it can be handed to the host.
    pub fn wrap(&self, list: Arc<EventList<T>>) -> ManagedList<T> {
        ManagedList::wrap(list)
    }

    /// Copies the elements of `list` under its read lock.
    pub fn elements(&self, list: &EventList<T>) -> Vec<T> {
        list.read().to_vec()
    }

    /// Makes `target` equal to `source` with the fewest positional
    /// operations, as one event on `target`.
    ///
    /// Takes the write lock of `target` and then the read lock of
    /// `source`. When both share a category lock this is a reentrant
    /// acquisition on the same lock.
    ///
    /// Returns whether `target` changed.
    ///
    /// # Errors
    ///
    /// Only protocol errors from a corrupted transaction state.
    pub fn replace_elements(
        &self,
        target: &ManagedList<T>,
        source: &EventList<T>,
    ) -> Result<bool, ListError>
    where
        T: PartialEq,
    {
        let writer = target.write();
        let reader = source.read();
        let snapshot = reader.to_vec();
        let changed = writer.update_all(&snapshot)?;
        drop(reader);
        debug!(
            target = %target.id(),
            source = %source.id(),
            elements = snapshot.len(),
            changed,
            "collection elements replaced"
        );
        Ok(changed)
    }
}

impl<T: Clone + PartialEq> CollectionType<T> {
    /// Returns `true` if `list` holds an element equal to `value`.
    pub fn contains(&self, list: &EventList<T>, value: &T) -> bool {
        list.read().contains(value)
    }

    /// Position of the first element of `list` equal to `value`.
    pub fn index_of(&self, list: &EventList<T>, value: &T) -> Option<usize> {
        list.read().index_of(value)
    }
}

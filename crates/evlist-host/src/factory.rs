//! Factories that construct lists for the host layer.
//!
//! Lock and publisher construction happens here, never inside the core.
//! [`DefaultListFactory`] gives each list its own handles;
//! [`CategoryListFactory`] hands every list the handles of one category.

use std::sync::Arc;

use evlist_core::{EventList, ListError, ListEventPublisher, ListLock};

use crate::category::{CategoryRegistry, ListCategory};
use crate::config::ListsConfig;

/// Constructs empty lists.
pub trait ListFactory<T>: Send + Sync {
    /// Creates an empty list with the factory's default capacity.
    fn create_list(&self) -> EventList<T>;

    /// Creates an empty list pre-sized for `capacity` elements.
    fn create_list_with_capacity(&self, capacity: usize) -> EventList<T>;
}

/// Creates lists with unshared locks and publishers.
#[derive(Debug, Clone)]
pub struct DefaultListFactory {
    initial_capacity: usize,
}

impl DefaultListFactory {
    /// Creates a factory reserving `initial_capacity` for unsized lists.
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }
}

impl Default for DefaultListFactory {
    fn default() -> Self {
        Self::new(evlist_core::DEFAULT_CAPACITY)
    }
}

impl<T> ListFactory<T> for DefaultListFactory {
    fn create_list(&self) -> EventList<T> {
        EventList::with_capacity(self.initial_capacity)
    }

    fn create_list_with_capacity(&self, capacity: usize) -> EventList<T> {
        EventList::with_capacity(capacity)
    }
}

/// Creates lists that all share one category's lock and publisher.
#[derive(Debug, Clone)]
pub struct CategoryListFactory {
    category: ListCategory,
    initial_capacity: usize,
}

impl CategoryListFactory {
    /// Creates a factory for the category called `name` in `registry`.
    ///
    /// # Errors
    ///
    /// Returns `ListError::InvalidArgument` if `name` is empty.
    pub fn new(
        registry: &CategoryRegistry,
        name: &str,
        initial_capacity: usize,
    ) -> Result<Self, ListError> {
        Ok(Self {
            category: registry.category(name)?,
            initial_capacity,
        })
    }

    /// The category this factory serves.
    pub fn category(&self) -> &ListCategory {
        &self.category
    }

    fn handles(&self) -> (ListLock, ListEventPublisher) {
        (self.category.lock().clone(), self.category.publisher().clone())
    }
}

impl<T> ListFactory<T> for CategoryListFactory {
    fn create_list(&self) -> EventList<T> {
        self.create_list_with_capacity(self.initial_capacity)
    }

    fn create_list_with_capacity(&self, capacity: usize) -> EventList<T> {
        let (lock, publisher) = self.handles();
        EventList::with_capacity_and_handles(capacity, lock, publisher)
    }
}

/// Builds the factory described by `config`: a category factory when a
/// category is configured, the default factory otherwise.
///
/// # Errors
///
/// Returns `ListError::InvalidArgument` if the configured category name is
/// empty.
pub fn factory_from_config<T>(
    config: &ListsConfig,
    registry: &CategoryRegistry,
) -> Result<Arc<dyn ListFactory<T>>, ListError> {
    match config.category.as_deref() {
        Some(name) => {
            let factory = CategoryListFactory::new(registry, name, config.initial_capacity)?;
            tracing::info!(category = name, "lists share category handles");
            Ok(Arc::new(factory))
        }
        None => Ok(Arc::new(DefaultListFactory::new(config.initial_capacity))),
    }
}

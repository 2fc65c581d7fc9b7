//! Named list categories.
//!
//! A category pairs one [`ListLock`] with one [`ListEventPublisher`]. Every
//! list created for a category receives clones of both handles, so writes
//! to any of them serialize against all of them and their events share one
//! sequence. The registry is an ordinary value passed to whoever needs it;
//! there is no process-wide registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use evlist_core::{ListError, ListEventPublisher, ListLock};
use parking_lot::RwLock;

/// Shared handles of one category.
#[derive(Debug, Clone)]
pub struct ListCategory {
    name: Arc<str>,
    lock: ListLock,
    publisher: ListEventPublisher,
}

impl ListCategory {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            lock: ListLock::new(),
            publisher: ListEventPublisher::new(),
        }
    }

    /// The category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lock shared by the category's lists.
    pub fn lock(&self) -> &ListLock {
        &self.lock
    }

    /// The publisher shared by the category's lists.
    pub fn publisher(&self) -> &ListEventPublisher {
        &self.publisher
    }
}

/// Thread-safe map from category name to shared handles.
#[derive(Debug, Default)]
pub struct CategoryRegistry {
    categories: RwLock<BTreeMap<String, ListCategory>>,
}

impl CategoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the category called `name`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `ListError::InvalidArgument` if `name` is empty or blank.
    pub fn category(&self, name: &str) -> Result<ListCategory, ListError> {
        if name.trim().is_empty() {
            return Err(ListError::InvalidArgument("category name must not be empty".to_string()));
        }
        if let Some(existing) = self.categories.read().get(name) {
            return Ok(existing.clone());
        }

        let mut categories = self.categories.write();
        let category = categories
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(category = name, "list category created");
                ListCategory::new(name)
            })
            .clone();
        Ok(category)
    }

    /// Returns the category called `name` if it exists.
    pub fn get(&self, name: &str) -> Option<ListCategory> {
        self.categories.read().get(name).cloned()
    }

    /// Names of all known categories, sorted.
    pub fn names(&self) -> Vec<String> {
        self.categories.read().keys().cloned().collect()
    }

    /// Number of known categories.
    pub fn len(&self) -> usize {
        self.categories.read().len()
    }

    /// Returns `true` if no category exists yet.
    pub fn is_empty(&self) -> bool {
        self.categories.read().is_empty()
    }
}

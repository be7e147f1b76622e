//! In-memory dataset store keyed by entity id.
//!
//! Each entry sits behind its own mutex, so mutations of one id are
//! serialized while calls touching different ids proceed in parallel. The
//! outer map lock is only held long enough to find or insert an entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{CityError, ResourceKind};

/// An entity that can live in a [`DatasetStore`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// Which kind of resource a missed lookup reports.
    const KIND: ResourceKind;

    /// Unique id of the entity.
    fn id(&self) -> &str;
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// The id was absent and a new entry was created.
    Created,
    /// An existing entry was merged.
    Updated,
}

/// Key-value table of entities with per-key mutation.
pub struct DatasetStore<T: Entity> {
    entries: RwLock<HashMap<String, Arc<Mutex<T>>>>,
}

impl<T: Entity> Default for DatasetStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> std::fmt::Debug for DatasetStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Entity> DatasetStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store seeded with `entities`.
    #[must_use]
    pub fn with_entities(entities: impl IntoIterator<Item = T>) -> Self {
        let store = Self::new();
        for entity in entities {
            store.insert(entity);
        }
        store
    }

    /// Insert or replace an entity.
    pub fn insert(&self, entity: T) {
        let id = entity.id().to_string();
        self.entries.write().insert(id, Arc::new(Mutex::new(entity)));
    }

    /// Whether an entity with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of a single entity.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`CityError`] for an unknown id.
    pub fn get(&self, id: &str) -> Result<T, CityError> {
        let entry = self.entry(id)?;
        let snapshot = entry.lock().clone();
        Ok(snapshot)
    }

    /// Snapshot of every entity, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<T> {
        let entries: Vec<Arc<Mutex<T>>> = self.entries.read().values().cloned().collect();
        let mut items: Vec<T> = entries.iter().map(|entry| entry.lock().clone()).collect();
        items.sort_by(|a, b| a.id().cmp(b.id()));
        items
    }

    /// Mutate one entity while holding its lock.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`CityError`] for an unknown id.
    pub fn update<R>(&self, id: &str, mutate: impl FnOnce(&mut T) -> R) -> Result<R, CityError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock();
        Ok(mutate(&mut *guard))
    }

    /// Create the entity if absent, then merge `fields` into it.
    ///
    /// A new entity is merged before it is published, so readers never
    /// observe it without the merged fields.
    pub fn upsert(
        &self,
        id: &str,
        create: impl FnOnce() -> T,
        merge: impl FnOnce(&mut T),
    ) -> Upserted {
        let existing = {
            let mut entries = self.entries.write();
            match entries.get(id) {
                Some(entry) => Arc::clone(entry),
                None => {
                    let mut entity = create();
                    merge(&mut entity);
                    entries.insert(id.to_string(), Arc::new(Mutex::new(entity)));
                    return Upserted::Created;
                }
            }
        };
        merge(&mut *existing.lock());
        Upserted::Updated
    }

    /// Decrement a counter field unless it already sits at `floor`.
    ///
    /// Returns `Ok(true)` when the decrement happened and `Ok(false)` when
    /// the field was at or below the floor. The check and the decrement run
    /// under the entry lock.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`CityError`] for an unknown id.
    pub fn try_decrement(
        &self,
        id: &str,
        field: impl FnOnce(&mut T) -> &mut u32,
        floor: u32,
    ) -> Result<bool, CityError> {
        self.update(id, |entity| {
            let counter = field(entity);
            if *counter <= floor {
                return false;
            }
            *counter -= 1;
            true
        })
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<T>>, CityError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CityError::not_found(T::KIND, id))
    }
}

//! Traffic-flow subscriber registry.
//!
//! Tracks which intersection each subscriber watches and how many
//! subscribers watch each intersection. Several subscribers may watch the
//! same intersection; each one still gets its own producer.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Unique identifier of a streaming subscriber.
pub type SubscriberId = u64;

/// An intersection id.
pub type IntersectionId = String;

#[derive(Debug, Default)]
struct RegistryState {
    /// Subscriber to watched intersection.
    subscribers: HashMap<SubscriberId, IntersectionId>,
    /// Intersection to number of watchers.
    watchers: HashMap<IntersectionId, usize>,
}

impl RegistryState {
    fn add(&mut self, subscriber: SubscriberId, intersection: &str) -> bool {
        if self.subscribers.contains_key(&subscriber) {
            return false;
        }
        self.subscribers
            .insert(subscriber, intersection.to_string());
        *self.watchers.entry(intersection.to_string()).or_insert(0) += 1;
        true
    }

    fn remove(&mut self, subscriber: SubscriberId) -> Option<IntersectionId> {
        let intersection = self.subscribers.remove(&subscriber)?;
        if let Some(count) = self.watchers.get_mut(&intersection) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.watchers.remove(&intersection);
            }
        }
        Some(intersection)
    }
}

/// Thread-safe registry of active traffic-flow subscribers.
///
/// ```rust
/// use city_services::domain::subscription::SubscriptionRegistry;
///
/// let registry = SubscriptionRegistry::new();
/// assert!(registry.register(1, "int-001"));
/// assert!(registry.register(2, "int-001"));
/// assert_eq!(registry.watchers("int-001"), 2);
///
/// registry.unregister(1);
/// assert_eq!(registry.watchers("int-001"), 1);
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Returns `false` if the id is already taken.
    pub fn register(&self, subscriber: SubscriberId, intersection: &str) -> bool {
        self.state.write().add(subscriber, intersection)
    }

    /// Remove a subscriber, returning the intersection it watched.
    pub fn unregister(&self, subscriber: SubscriberId) -> Option<IntersectionId> {
        self.state.write().remove(subscriber)
    }

    /// Whether `subscriber` is registered.
    #[must_use]
    pub fn contains(&self, subscriber: SubscriberId) -> bool {
        self.state.read().subscribers.contains_key(&subscriber)
    }

    /// Intersection watched by `subscriber`.
    #[must_use]
    pub fn intersection_of(&self, subscriber: SubscriberId) -> Option<IntersectionId> {
        self.state.read().subscribers.get(&subscriber).cloned()
    }

    /// Number of subscribers watching `intersection`.
    #[must_use]
    pub fn watchers(&self, intersection: &str) -> usize {
        self.state
            .read()
            .watchers
            .get(intersection)
            .copied()
            .unwrap_or(0)
    }

    /// All registered subscriber ids.
    #[must_use]
    pub fn subscribers(&self) -> Vec<SubscriberId> {
        self.state.read().subscribers.keys().copied().collect()
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        RegistryStats {
            subscriber_count: state.subscribers.len(),
            intersection_count: state.watchers.len(),
        }
    }
}

/// Snapshot of registry sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Active subscribers.
    pub subscriber_count: usize,
    /// Distinct intersections being watched.
    pub intersection_count: usize,
}

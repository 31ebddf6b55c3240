use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Store-assigned version pair of one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Revision at which the item was created
    pub create: u64,
    /// Revision of the latest modification
    pub modified: u64,
}

impl Version {
    pub fn new(create: u64, modified: u64) -> Self {
        Self { create, modified }
    }

    /// Whether an incoming PUT carrying `self` should replace an item tracked at `tracked`.
    pub fn supersedes(&self, tracked: &Version) -> bool {
        if self.create < tracked.create {
            return false;
        }
        self.create > tracked.create || self.modified > tracked.modified
    }
}

/// An item together with the version it was observed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: Version,
    pub payload: T,
}

/// Complete set of known items keyed by id.
///
/// Watch callbacks always deliver whole snapshots built from this set.
#[derive(Debug, Clone)]
pub struct VersionedSet<T> {
    items: HashMap<String, Versioned<T>>,
}

impl<T> Default for VersionedSet<T> {
    fn default() -> Self {
        Self { items: HashMap::new() }
    }
}

impl<T: Clone> VersionedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Versioned<T>> {
        self.items.get(id)
    }

    pub fn version_of(&self, id: &str) -> Option<Version> {
        self.items.get(id).map(|v| v.version)
    }

    /// Merge a PUT event. Returns `true` if the set changed.
    pub fn apply_put(&mut self, id: impl Into<String>, version: Version, payload: T) -> bool {
        let id = id.into();
        let should_apply = match self.items.get(&id) {
            Some(tracked) => version.supersedes(&tracked.version),
            None => true,
        };

        if should_apply {
            self.items.insert(id, Versioned { version, payload });
        }
        should_apply
    }

    /// Merge a DELETE event observed at revision `modified`. Unknown ids are ignored.
    pub fn apply_delete(&mut self, id: &str, modified: u64) -> bool {
        let should_apply =
            self.items.get(id).is_some_and(|tracked| modified > tracked.version.modified);

        if should_apply {
            self.items.remove(id);
        }
        should_apply
    }

    /// Drop an item regardless of version (e.g. it stopped matching a filter).
    pub fn remove(&mut self, id: &str) -> bool {
        self.items.remove(id).is_some()
    }

    /// Replace the whole set with a fresh listing.
    pub fn reset<I>(&mut self, listing: I)
    where
        I: IntoIterator<Item = (String, Version, T)>,
    {
        self.items = listing
            .into_iter()
            .map(|(id, version, payload)| (id, Versioned { version, payload }))
            .collect();
    }

    /// Snapshot of every payload, in no particular order.
    pub fn payloads(&self) -> Vec<T> {
        self.items.values().map(|v| v.payload.clone()).collect()
    }

    /// Snapshot of every payload ordered by id.
    pub fn sorted_payloads(&self) -> Vec<T> {
        let mut entries: Vec<_> = self.items.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, v)| v.payload.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::event::Occurrence;

/// Occurrence lists keyed by source name, as handed to the aggregator.
pub type Snapshot = BTreeMap<String, Arc<Vec<Occurrence>>>;

/// Latest normalized occurrences per source.
///
/// A source's list is only ever swapped as a whole, so readers see either the old
/// or the new list. Sources are never evicted.
#[derive(Debug, Default)]
pub struct Registry {
    sources: RwLock<Snapshot>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces everything registered for `source_name`.
    pub fn put(&self, source_name: &str, occurrences: Vec<Occurrence>) {
        let list = Arc::new(occurrences);

        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source_name.to_owned(), list);
    }

    /// Union of all sources' occurrences, in no particular order.
    pub fn get_all(&self) -> Vec<Occurrence> {
        self.snapshot()
            .values()
            .flat_map(|list| list.iter().cloned())
            .collect()
    }

    /// Cheap copy of the current lists; the lock is released before returning.
    pub fn snapshot(&self) -> Snapshot {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any source has been registered yet.
    pub fn is_loaded(&self) -> bool {
        !self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn len_sources(&self) -> usize {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// src/traverse/visited.rs
// =============================================================================
// The canonical keys already scheduled in one traversal run.
//
// admit() is the whole check-then-mark step under one lock, so two tasks
// that discover the same node at the same time can't both schedule it.
//
// Nodes may carry a distance from the root (crawl depth for web pages). A
// key seen before is admitted again only when it comes back with a strictly
// smaller distance, and the smaller distance is stored. Where a node ends up
// therefore doesn't depend on which path happened to reach it first.
// =============================================================================

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: Mutex<HashMap<String, Option<usize>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as visited at `distance`; returns false if it needs no
    /// (further) visit
    pub fn admit(&self, key: String, distance: Option<usize>) -> bool {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        match keys.get_mut(&key) {
            None => {
                keys.insert(key, distance);
                true
            }
            Some(best) => match (*best, distance) {
                (Some(old), Some(new)) if new < old => {
                    *best = Some(new);
                    true
                }
                _ => false,
            },
        }
    }

    /// All keys, sorted so reports are stable between runs
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

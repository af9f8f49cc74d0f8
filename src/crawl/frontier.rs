//! Breadth-first frontier with enqueue-at-most-once semantics.

use std::collections::{HashSet, VecDeque};

/// Pending identifiers plus the bookkeeping sets that guard them.
///
/// `seen` is `visited ∪ queued`, so membership checks never scan the queue.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    seen: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn with_seed(seed: &str) -> Self {
        let mut frontier = Self::default();
        frontier.enqueue(seed);
        frontier
    }

    /// Queue `id` unless it was ever queued or visited. Returns whether it was added.
    pub fn enqueue(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.queue.push_back(id.to_string());
        true
    }

    /// Pop the next unvisited identifier and mark it visited.
    pub fn next_unvisited(&mut self) -> Option<String> {
        while let Some(id) = self.queue.pop_front() {
            if self.visited.contains(&id) {
                continue;
            }
            self.visited.insert(id.clone());
            return Some(id);
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    /// Identifiers still waiting, in queue order.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }
}

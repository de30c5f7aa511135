//! Bounded set of already-published record identities.
//!
//! Identities are kept in insertion order next to a lookup set. When a `mark`
//! pushes the size over `ceiling`, the oldest entries are dropped until
//! `floor` remain. Callers only rely on `seen`/`mark` and on the size bound;
//! the order of eviction is an implementation detail.

use std::collections::{HashSet, VecDeque};

pub const DEFAULT_CEILING: usize = 10_000;
pub const DEFAULT_FLOOR: usize = 5_000;

#[derive(Debug)]
pub struct Deduplicator {
    order: VecDeque<String>,
    index: HashSet<String>,
    ceiling: usize,
    floor: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING, DEFAULT_FLOOR)
    }
}

impl Deduplicator {
    /// `floor` is clamped to `ceiling`; a zero ceiling is treated as 1.
    pub fn new(ceiling: usize, floor: usize) -> Self {
        let ceiling = ceiling.max(1);
        let floor = floor.min(ceiling);
        Self {
            order: VecDeque::with_capacity(ceiling.min(DEFAULT_CEILING) + 1),
            index: HashSet::with_capacity(ceiling.min(DEFAULT_CEILING) + 1),
            ceiling,
            floor,
        }
    }

    pub fn seen(&self, identity: &str) -> bool {
        self.index.contains(identity)
    }

    /// Remember `identity`. Marking an identity twice is a no-op.
    pub fn mark(&mut self, identity: &str) {
        if !self.index.insert(identity.to_string()) {
            return;
        }
        self.order.push_back(identity.to_string());

        if self.order.len() > self.ceiling {
            let before = self.order.len();
            while self.order.len() > self.floor {
                if let Some(old) = self.order.pop_front() {
                    self.index.remove(&old);
                }
            }
            tracing::debug!(
                target: "ingest",
                before,
                after = self.order.len(),
                "dedup cache pruned"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_then_seen() {
        let mut d = Deduplicator::default();
        assert!(!d.seen("https://x/1"));
        d.mark("https://x/1");
        assert!(d.seen("https://x/1"));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn double_mark_keeps_single_entry() {
        let mut d = Deduplicator::new(3, 1);
        d.mark("a");
        d.mark("a");
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn prune_drops_to_floor_once_over_ceiling() {
        let mut d = Deduplicator::new(4, 2);
        for id in ["a", "b", "c", "d"] {
            d.mark(id);
        }
        assert_eq!(d.len(), 4);
        d.mark("e");
        assert_eq!(d.len(), 2);
        // the newest entry always survives its own prune
        assert!(d.seen("e"));
        assert!(!d.seen("a"));
    }

    #[test]
    fn odd_parameters_are_sanitized() {
        let d = Deduplicator::new(0, 10);
        assert_eq!(d.ceiling(), 1);
        let mut d = d;
        d.mark("x");
        d.mark("y");
        assert!(d.len() <= 1);
        assert!(d.seen("y"));
    }
}

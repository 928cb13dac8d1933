//! Reachability-based circular reference detection.
//!
//! A standalone utility: the recursive processor does its own path-scoped
//! cycle checks and does not consult this graph.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::entity::EntityId;

/// Directed reference graph answering "would this edge close a cycle?".
///
/// # Example
///
/// ```rust
/// use dict_trans::CircularReferenceDetector;
///
/// let mut detector: CircularReferenceDetector<&str> = CircularReferenceDetector::new();
/// detector.add_reference("a", "b");
/// detector.add_reference("b", "c");
///
/// assert!(detector.would_create_circle(&"c", &"a"));
/// assert!(!detector.would_create_circle(&"a", &"c"));
/// ```
#[derive(Debug, Clone)]
pub struct CircularReferenceDetector<K = EntityId> {
    references: HashMap<K, HashSet<K>>,
}

impl<K> Default for CircularReferenceDetector<K> {
    fn default() -> Self {
        Self {
            references: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> CircularReferenceDetector<K> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if adding `from -> to` would close a cycle, i.e. `from`
    /// is reachable from `to`. A self edge always closes a cycle.
    ///
    /// Runs an iterative depth-first search; no recursion.
    pub fn would_create_circle(&self, from: &K, to: &K) -> bool {
        if from == to {
            return true;
        }

        let mut visited: HashSet<&K> = HashSet::new();
        let mut stack: Vec<&K> = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(targets) = self.references.get(current) {
                stack.extend(targets.iter().filter(|t| !visited.contains(t)));
            }
        }

        false
    }

    /// Records the edge `from -> to`.
    pub fn add_reference(&mut self, from: K, to: K) {
        self.references.entry(from).or_default().insert(to);
    }

    /// Removes the edge `from -> to`, dropping `from` once it has no edges.
    pub fn remove_reference(&mut self, from: &K, to: &K) {
        if let Some(targets) = self.references.get_mut(from) {
            targets.remove(to);
            if targets.is_empty() {
                self.references.remove(from);
            }
        }
    }

    /// Removes every edge.
    pub fn clear(&mut self) {
        self.references.clear();
    }

    /// Number of nodes with at least one outgoing edge.
    pub fn graph_size(&self) -> usize {
        self.references.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let detector: CircularReferenceDetector<u32> = CircularReferenceDetector::new();
        assert!(!detector.would_create_circle(&1, &2));
        assert_eq!(detector.graph_size(), 0);
    }

    #[test]
    fn test_self_reference() {
        let detector: CircularReferenceDetector<u32> = CircularReferenceDetector::new();
        assert!(detector.would_create_circle(&1, &1));
    }

    #[test]
    fn test_direct_and_transitive_cycles() {
        let mut detector = CircularReferenceDetector::new();
        detector.add_reference(1, 2);
        detector.add_reference(2, 3);
        detector.add_reference(3, 4);

        assert!(detector.would_create_circle(&2, &1));
        assert!(detector.would_create_circle(&4, &1));
        assert!(!detector.would_create_circle(&1, &4));
        assert!(!detector.would_create_circle(&5, &1));
    }

    #[test]
    fn test_diamond_without_cycle() {
        let mut detector = CircularReferenceDetector::new();
        detector.add_reference("a", "b");
        detector.add_reference("a", "c");
        detector.add_reference("b", "d");
        detector.add_reference("c", "d");

        assert!(!detector.would_create_circle(&"a", &"e"));
        assert!(detector.would_create_circle(&"d", &"a"));
    }

    #[test]
    fn test_existing_cycle_terminates() {
        let mut detector = CircularReferenceDetector::new();
        detector.add_reference(1, 2);
        detector.add_reference(2, 1);

        assert!(!detector.would_create_circle(&3, &1));
    }

    #[test]
    fn test_remove_reference_drops_empty_entries() {
        let mut detector = CircularReferenceDetector::new();
        detector.add_reference(1, 2);
        detector.add_reference(1, 3);
        assert_eq!(detector.graph_size(), 1);

        detector.remove_reference(&1, &2);
        assert_eq!(detector.graph_size(), 1);
        detector.remove_reference(&1, &3);
        assert_eq!(detector.graph_size(), 0);
        assert!(!detector.would_create_circle(&3, &1));
    }

    #[test]
    fn test_clear() {
        let mut detector = CircularReferenceDetector::new();
        detector.add_reference(1, 2);
        detector.clear();
        assert_eq!(detector.graph_size(), 0);
    }

    #[test]
    fn test_long_chain_is_iterative() {
        let mut detector = CircularReferenceDetector::new();
        for i in 0..100_000u32 {
            detector.add_reference(i, i + 1);
        }
        assert!(detector.would_create_circle(&100_000, &0));
    }
}

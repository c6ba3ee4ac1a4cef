//! # Searchable sets
//!
//! A searchable set is a bag of planning graph nodes with a spatial index
//! over their states. The node used to construct the set is distinguished as
//! the *initial node*, which the planner uses to identify the root of a
//! traversal (the start of an outbound trip, or the goal of a return trip).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod kd_tree;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::plan::graph::NodeId;
use crate::space::State;

use kd_tree::KdTree;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Spatially indexed collection of graph nodes.
///
/// Queries operate solely on the vector form of each node's state, and are
/// deterministic given an identical insertion history.
#[derive(Debug)]
pub struct SearchableSet {
    kd: KdTree,
    initial: NodeId,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl SearchableSet {
    /// Create a set containing the single distinguished initial node.
    pub fn new<S: State>(initial: NodeId, state: &S) -> Self {
        let mut kd = KdTree::new();
        kd.insert(state.to_vector(), initial);

        Self { kd, initial }
    }

    /// The node this set was constructed with.
    pub fn initial_node(&self) -> NodeId {
        self.initial
    }

    pub fn len(&self) -> usize {
        self.kd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kd.len() == 0
    }

    /// Insert a node; it becomes visible to all subsequent queries.
    pub fn insert<S: State>(&mut self, id: NodeId, state: &S) {
        self.kd.insert(state.to_vector(), id);
    }

    /// The `k` nearest nodes to `state`, nearest first. Distance ties are
    /// broken by insertion order.
    pub fn knn_search<S: State>(&self, state: &S, k: usize) -> Vec<NodeId> {
        self.kd.knn(&state.to_vector(), k)
    }

    /// All nodes within Euclidean distance `radius` of `state`, in insertion
    /// order.
    pub fn radius_search<S: State>(&self, state: &S, radius: f64) -> Vec<NodeId> {
        self.kd.radius(&state.to_vector(), radius)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::plan::graph::NodeArena;
    use crate::space::PositionVelocity;

    fn pv(x: f64, y: f64) -> PositionVelocity {
        PositionVelocity::from_components(x, y, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_initial_node_is_queryable() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(pv(1.0, 1.0), 0.0, 0.0, true, None);

        let set = SearchableSet::new(root, &pv(1.0, 1.0));

        assert_eq!(set.initial_node(), root);
        assert_eq!(set.knn_search(&pv(0.0, 0.0), 1), vec![root]);
    }

    #[test]
    fn test_inserted_nodes_are_reachable() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(pv(0.0, 0.0), 0.0, 0.0, true, None);
        let set_nodes: Vec<_> = (1..=4)
            .map(|i| arena.alloc(pv(i as f64, 0.0), 0.0, 0.0, false, None))
            .collect();

        let mut set = SearchableSet::new(root, &arena[root].state);
        for &id in &set_nodes {
            set.insert(id, &arena[id].state);
        }

        assert_eq!(set.len(), 5);

        // Every inserted node comes back from a wide-enough radius query
        let all = set.radius_search(&pv(0.0, 0.0), 10.0);
        assert_eq!(all.len(), 5);

        // Nearest-first ordering from a query point near the far end
        let near = set.knn_search(&pv(4.1, 0.0), 2);
        assert_eq!(near, vec![set_nodes[3], set_nodes[2]]);
    }
}

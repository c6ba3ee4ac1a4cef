//! kd-tree over state vectors.
//!
//! Flat-array kd-tree backing [`super::SearchableSet`]. Nodes are never
//! removed and the tree is not rebalanced, so queries are deterministic for a
//! given insertion history; distance ties are broken by insertion order.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::DVector;
use ordered_float::NotNan;

use crate::plan::graph::NodeId;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct KdNode {
    point: DVector<f64>,
    id: NodeId,
    left: Option<usize>,
    right: Option<usize>,
}

/// kd-tree mapping state vectors to node handles.
#[derive(Debug, Default)]
pub(crate) struct KdTree {
    /// Tree nodes in insertion order; index 0 is the root.
    nodes: Vec<KdNode>,
}

/// Current k-best candidates, ordered by (distance, insertion index).
type Best = Vec<(NotNan<f64>, usize, NodeId)>;

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl KdTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn dim(&self) -> usize {
        self.nodes.first().map(|n| n.point.len()).unwrap_or(0)
    }

    /// Insert a point. All points in one tree must share the dimension of
    /// the first insertion.
    pub fn insert(&mut self, point: DVector<f64>, id: NodeId) {
        let new_index = self.nodes.len();

        if new_index == 0 {
            self.nodes.push(KdNode {
                point,
                id,
                left: None,
                right: None,
            });
            return;
        }

        debug_assert_eq!(point.len(), self.dim());

        let mut cur = 0;
        let mut depth = 0;
        loop {
            let axis = depth % self.dim();
            let go_left = point[axis] < self.nodes[cur].point[axis];
            let slot = if go_left {
                self.nodes[cur].left
            } else {
                self.nodes[cur].right
            };

            match slot {
                Some(next) => {
                    cur = next;
                    depth += 1;
                }
                None => {
                    if go_left {
                        self.nodes[cur].left = Some(new_index);
                    } else {
                        self.nodes[cur].right = Some(new_index);
                    }
                    self.nodes.push(KdNode {
                        point,
                        id,
                        left: None,
                        right: None,
                    });
                    return;
                }
            }
        }
    }

    /// The k nearest points to `query`, nearest first, with distance ties
    /// broken by insertion order.
    pub fn knn(&self, query: &DVector<f64>, k: usize) -> Vec<NodeId> {
        let mut best: Best = Vec::with_capacity(k + 1);

        if k > 0 && !self.nodes.is_empty() {
            self.knn_visit(0, 0, query, k, &mut best);
        }

        best.into_iter().map(|(_, _, id)| id).collect()
    }

    fn knn_visit(&self, cur: usize, depth: usize, query: &DVector<f64>, k: usize, best: &mut Best) {
        let node = &self.nodes[cur];

        if let Ok(dist) = NotNan::new((&node.point - query).norm()) {
            let pos = best.partition_point(|&(d, s, _)| (d, s) < (dist, cur));
            best.insert(pos, (dist, cur, node.id));
            if best.len() > k {
                best.pop();
            }
        }

        let axis = depth % self.dim();
        let diff = query[axis] - node.point[axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(n) = near {
            self.knn_visit(n, depth + 1, query, k, best);
        }

        // The far side can still hold an equal-distance point with an earlier
        // insertion index, so only prune on a strictly larger plane distance.
        let search_far = match best.last() {
            Some(&(worst, _, _)) if best.len() == k => diff.abs() <= worst.into_inner(),
            _ => true,
        };

        if search_far {
            if let Some(f) = far {
                self.knn_visit(f, depth + 1, query, k, best);
            }
        }
    }

    /// All points within Euclidean distance `radius` of `query`, in
    /// insertion order.
    pub fn radius(&self, query: &DVector<f64>, radius: f64) -> Vec<NodeId> {
        let mut hits: Vec<(usize, NodeId)> = Vec::new();

        if !self.nodes.is_empty() && radius >= 0.0 {
            self.radius_visit(0, 0, query, radius, &mut hits);
        }

        hits.sort_by_key(|&(seq, _)| seq);
        hits.into_iter().map(|(_, id)| id).collect()
    }

    fn radius_visit(
        &self,
        cur: usize,
        depth: usize,
        query: &DVector<f64>,
        radius: f64,
        hits: &mut Vec<(usize, NodeId)>,
    ) {
        let node = &self.nodes[cur];

        if (&node.point - query).norm() <= radius {
            hits.push((cur, node.id));
        }

        let axis = depth % self.dim();
        let diff = query[axis] - node.point[axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(n) = near {
            self.radius_visit(n, depth + 1, query, radius, hits);
        }

        if diff.abs() <= radius {
            if let Some(f) = far {
                self.radius_visit(f, depth + 1, query, radius, hits);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

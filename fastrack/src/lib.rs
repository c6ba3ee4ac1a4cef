//! # FaSTrack Planning Core
//!
//! This library implements the planning half of the FaSTrack framework: a
//! fast, dynamically-capable tracker follows trajectories produced by a
//! simpler planning model, and is guaranteed to stay within a precomputed
//! tracking error bound of the reference. The bound and the optimal tracking
//! control law both come from an offline-computed value function, which this
//! library treats as an oracle.
//!
//! The centrepiece is [`plan::GraphDynamicPlanner`], a sampling-based planner
//! whose trajectories are *recursively feasible*: every node accepted into
//! the planning graph has a witnessed path back to a goal, so replanning from
//! any point along the returned trajectory can always continue safely.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Planning module - the graph dynamic planner and its collaborator traits
pub mod plan;

/// Searchable set module - spatially indexed collections of graph nodes
pub mod set;

/// State space module - state representations and sampling
pub mod space;

/// Tracking module - reference-following control using the value function
pub mod track;

/// Trajectory module - timestamped state sequences
pub mod traj;

/// Value function module - the precomputed reachability oracle
pub mod value;

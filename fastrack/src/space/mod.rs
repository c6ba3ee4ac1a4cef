//! # State spaces
//!
//! A state is an abstract point in the planning model's configuration space.
//! The planner only ever touches states through the [`State`] and
//! [`StateSpace`] traits: conversion to a vector for spatial queries, linear
//! blending for interpolation, and uniform sampling over a bounded region.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod position_velocity;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::DVector;

pub use position_velocity::{PositionVelocity, PositionVelocitySpace};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tolerance used for approximate state equality.
pub const STATE_EPSILON: f64 = 1e-8;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A point in the planner's configuration space.
pub trait State: Clone + std::fmt::Debug {
    /// Convert the state into its finite-dimensional vector form. Distances
    /// and spatial queries operate solely on this representation.
    fn to_vector(&self) -> DVector<f64>;

    /// Linear blend `(1 - alpha) * self + alpha * other`.
    fn lerp(&self, other: &Self, alpha: f64) -> Self;

    /// Euclidean distance between the vector forms of two states.
    fn distance(&self, other: &Self) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }

    /// `true` if the two states are within `tol` of each other.
    fn is_approx(&self, other: &Self, tol: f64) -> bool {
        self.distance(other) < tol
    }
}

/// A bounded region of states supporting uniform random sampling.
///
/// Spaces own their random number generator and are constructed from a seed,
/// so that planning runs are reproducible.
pub trait StateSpace {
    type State: State;

    /// Draw a uniform sample over the space's bounding region.
    fn sample(&mut self) -> Self::State;
}

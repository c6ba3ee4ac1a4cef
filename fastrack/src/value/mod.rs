//! # Value function oracle
//!
//! The value function is the solution of an offline Hamilton–Jacobi
//! reachability problem between the tracker's dynamics and the planning
//! model. At runtime it is an oracle answering three questions: the optimal
//! tracking control for a tracker/planner state pair, the worst-case tracking
//! error bound, and the kinematic limits of the planning model. The artefact
//! is computed offline and loaded once at startup.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fs;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::space::PositionVelocity;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Worst-case deviation between tracker and planner states, as an
/// axis-aligned box half-width around the reference point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackingBound {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Kinematic limits of the planning model guaranteed by the value function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlannerDynamics {
    /// Maximum planner speed per axis.
    pub max_speed: Vector3<f64>,
}

/// Value function artefact produced by offline reachability analysis.
///
/// Stores, per axis, a uniformly spaced table of optimal accelerations over
/// the relative position error range `[-bound, +bound]` (the value gradient
/// collapsed onto the position error axis), a relative-velocity damping gain
/// and the control saturation limits.
#[derive(Debug, Clone, Deserialize)]
pub struct TabulatedValueFunction {
    bound: TrackingBound,
    planner_dynamics: PlannerDynamics,
    control_tables: [Vec<f64>; 3],
    velocity_gain: Vector3<f64>,
    control_limit: Vector3<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("Could not read the value function file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Could not deserialise the value function file: {0}")]
    DeserialiseError(serde_json::Error),

    #[error("Control table for axis {0} is empty")]
    EmptyTable(usize),

    #[error("Tracking bound must be positive on every axis")]
    NonPositiveBound,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Runtime surface of the precomputed value function.
pub trait ValueFunction {
    /// Optimal tracking control for the given tracker and planner states.
    fn optimal_control(
        &self,
        tracker: &PositionVelocity,
        planner: &PositionVelocity,
    ) -> Vector3<f64>;

    /// The guaranteed tracking error bound.
    fn tracking_bound(&self) -> TrackingBound;

    /// Kinematic limits the planning model must respect.
    fn planner_dynamics(&self) -> PlannerDynamics;
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl TrackingBound {
    fn axis(&self, i: usize) -> f64 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl TabulatedValueFunction {
    /// Load the artefact from a JSON file on disk.
    pub fn load(path: &str) -> Result<Self, ValueError> {
        let data = fs::read_to_string(path).map_err(ValueError::FileLoadError)?;
        let vf: Self = serde_json::from_str(&data).map_err(ValueError::DeserialiseError)?;
        vf.validate()?;
        Ok(vf)
    }

    fn validate(&self) -> Result<(), ValueError> {
        for (i, table) in self.control_tables.iter().enumerate() {
            if table.is_empty() {
                return Err(ValueError::EmptyTable(i));
            }
        }

        if !(self.bound.x > 0.0 && self.bound.y > 0.0 && self.bound.z > 0.0) {
            return Err(ValueError::NonPositiveBound);
        }

        Ok(())
    }

    fn axis_control(&self, i: usize, rel_pos: f64, rel_vel: f64) -> f64 {
        let table = &self.control_tables[i];
        let half = self.bound.axis(i);

        // Map the relative position error onto the table, clamping states
        // outside the bound onto its edge cells.
        let idx = util::maths::lin_map((-half, half), (0.0, (table.len() - 1) as f64), rel_pos)
            .round()
            .clamp(0.0, (table.len() - 1) as f64) as usize;

        let u = table[idx] - self.velocity_gain[i] * rel_vel;
        u.clamp(-self.control_limit[i], self.control_limit[i])
    }
}

impl ValueFunction for TabulatedValueFunction {
    fn optimal_control(
        &self,
        tracker: &PositionVelocity,
        planner: &PositionVelocity,
    ) -> Vector3<f64> {
        let rel_pos = tracker.position - planner.position;
        let rel_vel = tracker.velocity - planner.velocity;

        Vector3::new(
            self.axis_control(0, rel_pos[0], rel_vel[0]),
            self.axis_control(1, rel_pos[1], rel_vel[1]),
            self.axis_control(2, rel_pos[2], rel_vel[2]),
        )
    }

    fn tracking_bound(&self) -> TrackingBound {
        self.bound
    }

    fn planner_dynamics(&self) -> PlannerDynamics {
        self.planner_dynamics
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

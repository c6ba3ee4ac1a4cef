//! # Tracking
//!
//! The tracker is a periodic controller running at a fixed cadence. Each
//! cycle it interpolates the latest planner trajectory at the current time
//! and asks the value function for the optimal control that keeps the
//! vehicle inside the tracking error bound of that reference point. It also
//! exposes the two query surfaces consumed by the rest of the system: the
//! tracking bound and the planner's dynamics.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use nalgebra::Vector3;
use serde::Deserialize;

use crate::space::PositionVelocity;
use crate::traj::{TrajError, Trajectory};
use crate::value::{PlannerDynamics, TrackingBound, ValueFunction};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the tracking controller.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Control cycle period, in seconds.
    pub time_step_s: f64,
}

/// Reference-following controller built on the value function oracle.
pub struct Tracker<V: ValueFunction> {
    value: V,
    time_step_s: f64,
    reference: Option<Trajectory<PositionVelocity>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("time_step_s must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("No reference trajectory has been set")]
    NoReference,

    #[error("Could not interpolate the reference trajectory: {0}")]
    ReferenceInterpolation(#[from] TrajError),
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl<V: ValueFunction> Tracker<V> {
    pub fn new(value: V, params: Params) -> Result<Self, TrackError> {
        if !(params.time_step_s > 0.0 && params.time_step_s.is_finite()) {
            return Err(TrackError::InvalidTimeStep(params.time_step_s));
        }

        Ok(Self {
            value,
            time_step_s: params.time_step_s,
            reference: None,
        })
    }

    /// Replace the reference trajectory with a newly planned one.
    ///
    /// An empty trajectory is a failed plan; the current reference is kept
    /// so the tracker continues following the last feasible plan.
    pub fn set_reference(&mut self, traj: Trajectory<PositionVelocity>) {
        if traj.is_empty() {
            warn!("Ignoring empty reference trajectory, keeping the current one");
            return;
        }

        self.reference = Some(traj);
    }

    /// The planner reference state at time `t`.
    pub fn reference_state(&self, t: f64) -> Result<PositionVelocity, TrackError> {
        let reference = self.reference.as_ref().ok_or(TrackError::NoReference)?;
        Ok(reference.interpolate(t)?)
    }

    /// One control cycle: the optimal control for the tracker state against
    /// the reference at time `t`.
    pub fn control(
        &self,
        tracker_state: &PositionVelocity,
        t: f64,
    ) -> Result<Vector3<f64>, TrackError> {
        let reference = self.reference_state(t)?;
        Ok(self.value.optimal_control(tracker_state, &reference))
    }

    pub fn time_step_s(&self) -> f64 {
        self.time_step_s
    }

    /// Query service: the guaranteed tracking error bound.
    pub fn tracking_bound(&self) -> TrackingBound {
        self.value.tracking_bound()
    }

    /// Query service: the planning model's dynamics.
    pub fn planner_dynamics(&self) -> PlannerDynamics {
        self.value.planner_dynamics()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    /// Pure proportional pull towards the reference position.
    struct PullBack;

    impl ValueFunction for PullBack {
        fn optimal_control(
            &self,
            tracker: &PositionVelocity,
            planner: &PositionVelocity,
        ) -> Vector3<f64> {
            planner.position - tracker.position
        }

        fn tracking_bound(&self) -> TrackingBound {
            TrackingBound {
                x: 0.5,
                y: 0.5,
                z: 0.5,
            }
        }

        fn planner_dynamics(&self) -> PlannerDynamics {
            PlannerDynamics {
                max_speed: Vector3::new(1.0, 1.0, 1.0),
            }
        }
    }

    fn pv(x: f64) -> PositionVelocity {
        PositionVelocity::from_components(x, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    fn tracker() -> Tracker<PullBack> {
        Tracker::new(PullBack, Params { time_step_s: 0.05 }).unwrap()
    }

    #[test]
    fn test_control_without_reference_fails() {
        let t = tracker();
        assert!(matches!(
            t.control(&pv(0.0), 0.0),
            Err(TrackError::NoReference)
        ));
    }

    #[test]
    fn test_control_pulls_towards_reference() {
        let mut t = tracker();
        t.set_reference(Trajectory::new(vec![pv(0.0), pv(10.0)], vec![0.0, 10.0]));

        // Reference at t = 5 is x = 5; tracker lagging at x = 4
        let u = t.control(&pv(4.0), 5.0).unwrap();
        assert_relative_eq!(u[0], 1.0);
    }

    #[test]
    fn test_empty_reference_is_ignored() {
        let mut t = tracker();
        t.set_reference(Trajectory::new(vec![pv(0.0), pv(1.0)], vec![0.0, 1.0]));
        t.set_reference(Trajectory::new_empty());

        // The earlier reference is still active
        assert_relative_eq!(t.reference_state(1.0).unwrap().x(), 1.0);
    }

    #[test]
    fn test_invalid_time_step_fails() {
        assert!(matches!(
            Tracker::new(PullBack, Params { time_step_s: 0.0 }),
            Err(TrackError::InvalidTimeStep(_))
        ));
    }
}

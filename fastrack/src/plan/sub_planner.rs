//! Straight-line sub-planner.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::space::State;
use crate::traj::Trajectory;

use super::SubPlanner;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Connects states along a straight segment at constant speed, with
/// intermediate samples at most `point_sep` apart in state-vector distance.
///
/// Suitable for planning models whose dynamics admit straight-line motion
/// (geometric or kinematic planners). Models that cannot move this way
/// should supply their own [`SubPlanner`].
#[derive(Debug, Clone)]
pub struct StraightLinePlanner {
    speed: f64,
    point_sep: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl StraightLinePlanner {
    pub fn new(speed: f64, point_sep: f64) -> Self {
        Self { speed, point_sep }
    }
}

impl<S: State> SubPlanner<S> for StraightLinePlanner {
    fn sub_plan(&self, from: &S, to: &S, start_time: f64) -> Trajectory<S> {
        let dist = from.distance(to);

        // Infeasible configuration, signal failure with an empty trajectory
        if !dist.is_finite() || self.speed <= 0.0 || self.point_sep <= 0.0 {
            return Trajectory::new_empty();
        }

        let duration = dist / self.speed;

        if dist <= self.point_sep {
            return Trajectory::new(
                vec![from.clone(), to.clone()],
                vec![start_time, start_time + duration],
            );
        }

        // Interior samples at regular separation, endpoints exact
        let num_interior = (dist / self.point_sep).floor() as usize;

        let mut states = Vec::with_capacity(num_interior + 2);
        let mut times = Vec::with_capacity(num_interior + 2);

        states.push(from.clone());
        times.push(start_time);

        for i in 1..num_interior {
            let alpha = (i as f64 * self.point_sep) / dist;
            states.push(from.lerp(to, alpha));
            times.push(start_time + alpha * duration);
        }

        states.push(to.clone());
        times.push(start_time + duration);

        Trajectory::new(states, times)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;
    use crate::space::PositionVelocity;

    fn pv(x: f64) -> PositionVelocity {
        PositionVelocity::from_components(x, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_unit_speed_duration_equals_distance() {
        let planner = StraightLinePlanner::new(1.0, 0.25);
        let traj = planner.sub_plan(&pv(0.0), &pv(10.0), 2.0);

        assert!(!traj.is_empty());
        assert_relative_eq!(traj.duration(), 10.0);
        assert_relative_eq!(traj.first_time().unwrap(), 2.0);
        assert_relative_eq!(traj.first_state().unwrap().x(), 0.0);
        assert_relative_eq!(traj.last_state().unwrap().x(), 10.0);
    }

    #[test]
    fn test_short_connection_has_two_samples() {
        let planner = StraightLinePlanner::new(2.0, 1.0);
        let traj = planner.sub_plan(&pv(0.0), &pv(0.5), 0.0);

        assert_eq!(traj.size(), 2);
        assert_relative_eq!(traj.duration(), 0.25);
    }

    #[test]
    fn test_sample_spacing_is_bounded() {
        let planner = StraightLinePlanner::new(1.0, 0.5);
        let traj = planner.sub_plan(&pv(0.0), &pv(3.2), 0.0);

        for pair in traj.states().windows(2) {
            assert!(pair[0].distance(&pair[1]) <= 0.5 + 1e-12);
        }
    }

    #[test]
    fn test_zero_speed_is_infeasible() {
        let planner = StraightLinePlanner::new(0.0, 0.5);
        assert!(planner.sub_plan(&pv(0.0), &pv(1.0), 0.0).is_empty());
    }

    #[test]
    fn test_zero_length_connection() {
        let planner = StraightLinePlanner::new(1.0, 0.5);
        let traj = planner.sub_plan(&pv(3.0), &pv(3.0), 1.0);

        assert_eq!(traj.size(), 2);
        assert_relative_eq!(traj.duration(), 0.0);
    }
}

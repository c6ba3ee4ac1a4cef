//! Purely geometric (position + velocity) state.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{DVector, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{State, StateSpace};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A purely geometric state: position and velocity in R^3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionVelocity {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

/// An axis-aligned sampling region over [`PositionVelocity`] states.
///
/// Axes where the lower and upper bounds coincide are pinned to that value,
/// which allows lower-dimensional problems (a planar or 1-D planning model)
/// to be expressed in the same state type.
#[derive(Debug, Clone)]
pub struct PositionVelocitySpace {
    lower: PositionVelocity,
    upper: PositionVelocity,
    rng: StdRng,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl PositionVelocity {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self { position, velocity }
    }

    pub fn from_components(x: f64, y: f64, z: f64, vx: f64, vy: f64, vz: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            velocity: Vector3::new(vx, vy, vz),
        }
    }

    pub fn zero() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
        }
    }

    pub fn x(&self) -> f64 {
        self.position[0]
    }

    pub fn y(&self) -> f64 {
        self.position[1]
    }

    pub fn z(&self) -> f64 {
        self.position[2]
    }
}

impl From<[f64; 6]> for PositionVelocity {
    fn from(c: [f64; 6]) -> Self {
        Self::from_components(c[0], c[1], c[2], c[3], c[4], c[5])
    }
}

impl State for PositionVelocity {
    fn to_vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.position[0],
            self.position[1],
            self.position[2],
            self.velocity[0],
            self.velocity[1],
            self.velocity[2],
        ])
    }

    fn lerp(&self, other: &Self, alpha: f64) -> Self {
        Self {
            position: self.position.lerp(&other.position, alpha),
            velocity: self.velocity.lerp(&other.velocity, alpha),
        }
    }
}

impl PositionVelocitySpace {
    /// Create a new space spanning the box between `a` and `b`, with the
    /// given RNG seed.
    ///
    /// The bounds are normalised per axis, so the corners may be given in
    /// any order.
    pub fn new(a: PositionVelocity, b: PositionVelocity, seed: u64) -> Self {
        let mut lower = a;
        let mut upper = b;

        for i in 0..3 {
            if lower.position[i] > upper.position[i] {
                std::mem::swap(&mut lower.position[i], &mut upper.position[i]);
            }
            if lower.velocity[i] > upper.velocity[i] {
                std::mem::swap(&mut lower.velocity[i], &mut upper.velocity[i]);
            }
        }

        Self {
            lower,
            upper,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample_axis(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            lo
        } else {
            rng.gen_range(lo..hi)
        }
    }
}

impl StateSpace for PositionVelocitySpace {
    type State = PositionVelocity;

    fn sample(&mut self) -> PositionVelocity {
        let mut s = PositionVelocity::zero();

        for i in 0..3 {
            s.position[i] =
                Self::sample_axis(&mut self.rng, self.lower.position[i], self.upper.position[i]);
            s.velocity[i] =
                Self::sample_axis(&mut self.rng, self.lower.velocity[i], self.upper.velocity[i]);
        }

        s
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_lerp_midpoint() {
        let a = PositionVelocity::from_components(0.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        let b = PositionVelocity::from_components(2.0, 4.0, 6.0, 3.0, 0.0, 0.0);

        let mid = a.lerp(&b, 0.5);
        assert_relative_eq!(mid.x(), 1.0);
        assert_relative_eq!(mid.y(), 2.0);
        assert_relative_eq!(mid.z(), 3.0);
        assert_relative_eq!(mid.velocity[0], 2.0);
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = PositionVelocity::zero();
        let b = PositionVelocity::from_components(3.0, 4.0, 0.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let lower = PositionVelocity::from_components(-1.0, 0.0, 2.0, -0.5, 0.0, 0.0);
        let upper = PositionVelocity::from_components(1.0, 5.0, 2.0, 0.5, 0.0, 0.0);
        let mut space = PositionVelocitySpace::new(lower, upper, 42);

        for _ in 0..100 {
            let s = space.sample();
            for i in 0..3 {
                assert!(s.position[i] >= lower.position[i]);
                assert!(s.position[i] <= upper.position[i]);
                assert!(s.velocity[i] >= lower.velocity[i]);
                assert!(s.velocity[i] <= upper.velocity[i]);
            }
            // Degenerate axes are pinned exactly
            assert_eq!(s.z(), 2.0);
            assert_eq!(s.velocity[1], 0.0);
        }
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let lower = PositionVelocity::zero();
        let upper = PositionVelocity::from_components(10.0, 10.0, 10.0, 1.0, 1.0, 1.0);

        let mut space_a = PositionVelocitySpace::new(lower, upper, 7);
        let mut space_b = PositionVelocitySpace::new(lower, upper, 7);

        for _ in 0..20 {
            assert_eq!(space_a.sample(), space_b.sample());
        }
    }
}

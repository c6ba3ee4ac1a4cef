//! # Trajectories
//!
//! A trajectory is a pair of parallel sequences: states and non-decreasing
//! timestamps. Empty trajectories are legal and signal planner failure.
//! Construction repairs inconsistent inputs rather than rejecting them, since
//! a malformed sub-plan should degrade a single edge, not abort the whole
//! planning cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{warn, Level};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use util::log_throttle;

use crate::space::State;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum period between repeated interpolation range warnings, in seconds.
const WARN_PERIOD_S: f64 = 1.0;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A timestamped sequence of states.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<S: State> {
    states: Vec<S>,
    times: Vec<f64>,
}

/// One `(time, state)` sample, the wire form of a trajectory element.
#[derive(Serialize, Deserialize)]
struct Sample<S> {
    time: f64,
    state: S,
}

#[derive(Serialize)]
struct SampleRef<'a, S> {
    time: f64,
    state: &'a S,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajError {
    #[error("Cannot interpolate an empty trajectory")]
    EmptyTrajectory,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl<S: State> Trajectory<S> {
    /// Create a new empty trajectory.
    pub fn new_empty() -> Self {
        Self {
            states: Vec::new(),
            times: Vec::new(),
        }
    }

    /// Create a trajectory from parallel state and time lists.
    ///
    /// If the lists differ in length the longer one is truncated, and any
    /// time inversion is repaired by clamping the offending timestamp to its
    /// predecessor. Both repairs are logged.
    pub fn new(mut states: Vec<S>, mut times: Vec<f64>) -> Self {
        if states.len() != times.len() {
            warn!(
                "Trajectory state/time lists differ in length ({} vs {}), truncating",
                states.len(),
                times.len()
            );

            let len = states.len().min(times.len());
            states.truncate(len);
            times.truncate(len);
        }

        for i in 1..times.len() {
            if times[i - 1] > times[i] {
                warn!(
                    "Fixing an inversion in trajectory times at index {} ({} > {})",
                    i,
                    times[i - 1],
                    times[i]
                );
                times[i] = times[i - 1];
            }
        }

        Self { states, times }
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn first_time(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn first_state(&self) -> Option<&S> {
        self.states.first()
    }

    pub fn last_state(&self) -> Option<&S> {
        self.states.last()
    }

    /// Time spanned by the trajectory. Empty and single-sample trajectories
    /// have zero duration.
    pub fn duration(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Linearly interpolate the state at time `t`.
    ///
    /// Times outside the trajectory's range return the nearest endpoint with
    /// a rate-limited warning.
    pub fn interpolate(&self, t: f64) -> Result<S, TrajError> {
        if self.is_empty() {
            return Err(TrajError::EmptyTrajectory);
        }

        // Index of the first time not less than t
        let hi = self.times.partition_point(|&ti| ti < t);

        if hi == 0 {
            log_throttle!(
                Level::Warn,
                WARN_PERIOD_S,
                "Interpolating before the first trajectory time"
            );
            return Ok(self.states[0].clone());
        }

        if hi == self.times.len() {
            log_throttle!(
                Level::Warn,
                WARN_PERIOD_S,
                "Interpolating after the last trajectory time"
            );
            return Ok(self.states[self.states.len() - 1].clone());
        }

        // times[lo] < t <= times[hi], so the denominator is strictly positive
        let lo = hi - 1;
        let alpha = (t - self.times[lo]) / (self.times[hi] - self.times[lo]);
        Ok(self.states[lo].lerp(&self.states[hi], alpha))
    }

    /// Shift all timestamps so the trajectory starts at `t0`.
    pub fn reset_first_time(&mut self, t0: f64) {
        let shift = match self.times.first() {
            Some(first) => t0 - first,
            None => return,
        };

        for t in self.times.iter_mut() {
            *t += shift;
        }
    }

    /// Fuse a sequence of trajectories into one.
    ///
    /// The first non-empty input keeps its own start time; each following
    /// trajectory is re-timed to begin where its predecessor ended. Boundary
    /// samples are kept, so abutting endpoints appear twice.
    pub fn concatenate(trajs: &[Trajectory<S>]) -> Self {
        let mut states = Vec::new();
        let mut times = Vec::new();
        let mut next_start: Option<f64> = None;

        for traj in trajs {
            if traj.is_empty() {
                continue;
            }

            let mut piece = traj.clone();
            if let Some(start) = next_start {
                piece.reset_first_time(start);
            }
            next_start = piece.last_time();

            states.extend(piece.states);
            times.extend(piece.times);
        }

        Self { states, times }
    }
}

// Serialised form: an ordered sequence of (time, state) pairs.
impl<S: State + Serialize> Serialize for Trajectory<S> {
    fn serialize<Sz: Serializer>(&self, serializer: Sz) -> Result<Sz::Ok, Sz::Error> {
        let mut seq = serializer.serialize_seq(Some(self.size()))?;
        for (time, state) in self.times.iter().zip(self.states.iter()) {
            seq.serialize_element(&SampleRef { time: *time, state })?;
        }
        seq.end()
    }
}

impl<'de, S: State + Deserialize<'de>> Deserialize<'de> for Trajectory<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let samples = Vec::<Sample<S>>::deserialize(deserializer)?;

        let (states, times): (Vec<S>, Vec<f64>) =
            samples.into_iter().map(|s| (s.state, s.time)).unzip();

        // Route through the repairing constructor so wire-form input obeys
        // the same invariants as locally built trajectories.
        Ok(Self::new(states, times))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

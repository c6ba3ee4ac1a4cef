//! Planner parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the graph dynamic planner.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Radius for goal-candidate queries, in state-vector distance.
    pub search_radius: f64,

    /// Number of nearest neighbours considered when attaching a new sample.
    pub num_neighbors: usize,

    /// Wall-clock budget for each plan call, in seconds.
    pub max_runtime_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("num_neighbors must be at least 1")]
    NoNeighbors,

    #[error("search_radius must be positive and finite, got {0}")]
    InvalidSearchRadius(f64),

    #[error("max_runtime_s must be positive and finite, got {0}")]
    InvalidRuntime(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Params {
    /// Check the parameters are usable, failing initialisation otherwise.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.num_neighbors < 1 {
            return Err(ParamsError::NoNeighbors);
        }
        if !(self.search_radius > 0.0 && self.search_radius.is_finite()) {
            return Err(ParamsError::InvalidSearchRadius(self.search_radius));
        }
        if !(self.max_runtime_s > 0.0 && self.max_runtime_s.is_finite()) {
            return Err(ParamsError::InvalidRuntime(self.max_runtime_s));
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

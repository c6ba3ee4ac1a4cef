//! Time utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Instant;

use conquer_once::OnceCell;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Anchor instant for the monotonic clock, set on first use.
static MONOTONIC_ANCHOR: OnceCell<Instant> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the first call to this function.
///
/// Monotonic, and independent of the session epoch, so it is safe to call
/// before a session has been created.
pub fn monotonic_s() -> f64 {
    MONOTONIC_ANCHOR.init_once(Instant::now);

    match MONOTONIC_ANCHOR.get() {
        Some(anchor) => anchor.elapsed().as_secs_f64(),
        None => 0.0,
    }
}

/// Convert a [`chrono::Duration`] into fractional seconds.
///
/// Returns `None` if the duration is too large to be represented in
/// microseconds.
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration.num_microseconds().map(|us| us as f64 / 1e6)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

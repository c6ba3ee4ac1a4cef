//! # Plan Demo
//!
//! Runs the graph dynamic planner standalone: loads parameters and the value
//! function artefact, plans a single trajectory with the straight-line
//! sub-planner, hands it to the tracker and logs a few control cycles. This
//! is the quickest way to exercise the planning stack without the rest of
//! the vehicle software.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{env, thread, time::Duration, time::Instant};

use color_eyre::{eyre::WrapErr, Result};
use log::{debug, info};
use serde::Deserialize;

use fastrack::{
    plan::{DurationCost, GraphDynamicPlanner, Params, StraightLinePlanner, WallClock},
    space::{PositionVelocity, PositionVelocitySpace},
    track::{self, Tracker},
    traj::Trajectory,
    value::TabulatedValueFunction,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Parameter file used when none is given on the command line.
const DEFAULT_PARAMS_PATH: &str = "params/plan_demo.toml";

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DemoParams {
    start: [f64; 6],
    goal: [f64; 6],
    start_time: f64,

    planner: Params,
    space: SpaceParams,
    sub_planner: SubPlannerParams,
    tracker: TrackerParams,
}

#[derive(Debug, Deserialize)]
struct SpaceParams {
    lower: [f64; 6],
    upper: [f64; 6],
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct SubPlannerParams {
    speed: f64,
    point_sep: f64,
}

#[derive(Debug, Deserialize)]
struct TrackerParams {
    time_step_s: f64,
    value_function_path: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("plan_demo", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("FaSTrack Plan Demo");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- PARAMETERS ----

    let args: Vec<String> = env::args().collect();
    let params_path = match args.len() {
        1 => DEFAULT_PARAMS_PATH,
        _ => args[1].as_str(),
    };

    info!("Loading parameters from \"{}\"", params_path);
    let params: DemoParams =
        util::params::load(params_path).wrap_err("Failed to load demo parameters")?;
    debug!("Parameters: {:#?}", params);

    // ---- MODULE INIT ----

    let space = PositionVelocitySpace::new(
        params.space.lower.into(),
        params.space.upper.into(),
        params.space.seed,
    );

    let mut planner = GraphDynamicPlanner::new(
        params.planner.clone(),
        space,
        Box::new(StraightLinePlanner::new(
            params.sub_planner.speed,
            params.sub_planner.point_sep,
        )),
        Box::new(DurationCost),
        Box::new(WallClock::new()),
    )
    .wrap_err("Failed to initialise the planner")?;

    let value_function = TabulatedValueFunction::load(&params.tracker.value_function_path)
        .wrap_err("Failed to load the value function artefact")?;

    let mut tracker = Tracker::new(
        value_function,
        track::Params {
            time_step_s: params.tracker.time_step_s,
        },
    )
    .wrap_err("Failed to initialise the tracker")?;

    let bound = tracker.tracking_bound();
    info!(
        "Tracking error bound: [{:.2}, {:.2}, {:.2}] m",
        bound.x, bound.y, bound.z
    );

    // ---- PLAN ----

    let start: PositionVelocity = params.start.into();
    let goal: PositionVelocity = params.goal.into();

    info!(
        "Planning from ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
        start.x(),
        start.y(),
        start.z(),
        goal.x(),
        goal.y(),
        goal.z()
    );

    let plan_start = Instant::now();
    let traj = planner.plan(&start, &goal, params.start_time);
    let plan_elapsed_s = plan_start.elapsed().as_secs_f64();

    // Wait out the rest of the runtime budget to hold a stable replanning
    // cadence, as the tracker loop would.
    if plan_elapsed_s < params.planner.max_runtime_s {
        thread::sleep(Duration::from_secs_f64(
            params.planner.max_runtime_s - plan_elapsed_s,
        ));
    }

    if traj.is_empty() {
        info!("No trajectory found within the runtime budget");
        return Ok(());
    }

    info!(
        "Found a trajectory: {} samples over {:.3} s",
        traj.size(),
        traj.duration()
    );
    session::save_with_timestamp("plan_demo/trajectory.json", &traj);

    // ---- TRACKING CYCLES ----

    tracker.set_reference(traj.clone());
    run_tracking_cycles(&tracker, &traj)?;

    info!("Plan demo complete");
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Step the tracker along the reference and log the commanded controls.
fn run_tracking_cycles(
    tracker: &Tracker<TabulatedValueFunction>,
    traj: &Trajectory<PositionVelocity>,
) -> Result<()> {
    let t0 = traj.first_time().unwrap_or(0.0);
    let t1 = t0 + traj.duration();

    let mut t = t0;
    while t <= t1 {
        // Stand in for the vehicle state estimate with the reference itself
        let tracker_state = tracker
            .reference_state(t)
            .wrap_err("Failed to interpolate the reference")?;
        let control = tracker
            .control(&tracker_state, t)
            .wrap_err("Failed to compute a control")?;

        debug!(
            "t = {:6.2} s: reference x = {:6.2} m, control = [{:.2}, {:.2}, {:.2}]",
            t,
            tracker_state.x(),
            control[0],
            control[1],
            control[2]
        );

        t += tracker.time_step_s();
    }

    Ok(())
}

//! # Graph dynamic planner
//!
//! Sampling-based planner whose trajectories are recursively feasible. The
//! planner grows an implicit graph from the start state; each sampled node is
//! attached to its nearest feasible neighbour and connected onward to a goal
//! when possible. A node only becomes *viable* once a witnessed path from it
//! can recursively reach a goal, so any prefix of the returned trajectory
//! leaves the tracker in a state from which planning can safely continue.
//!
//! When a sample cannot reach a goal directly, the planner recurses with the
//! roles swapped: a return traversal expands from the stranded sample back
//! towards the existing graph, and its only purpose is to witness the
//! sample's viability. If the overall deadline expires before the goal is
//! reached, a viable loop anchored at the start is returned instead, keeping
//! the vehicle in recoverable motion.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;

use log::{debug, error, info, trace, warn, Level};
use serde::Serialize;
use util::log_throttle;

use crate::set::SearchableSet;
use crate::space::{State, StateSpace, STATE_EPSILON};
use crate::traj::Trajectory;

use super::graph::{Edge, NodeArena, NodeId};
use super::{CostFn, Params, ParamsError, RunClock, SubPlanner};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum period between repeated extraction error records, in seconds.
const ERROR_PERIOD_S: f64 = 1.0;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Sampling-based recursively-feasible planner over a generic state space.
pub struct GraphDynamicPlanner<Sp: StateSpace> {
    params: Params,
    space: Sp,
    sub_planner: Box<dyn SubPlanner<Sp::State>>,
    cost: Box<dyn CostFn<Sp::State>>,
    clock: Box<dyn RunClock>,
}

/// Statistics accumulated over a single plan call.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PlanReport {
    /// Samples drawn from the state space.
    pub num_samples: usize,

    /// Samples successfully attached to the graph.
    pub num_attached: usize,

    /// Return traversals started for stranded samples.
    pub num_escape_calls: usize,

    /// Wall-clock time consumed by the call.
    pub elapsed_s: f64,

    /// Whether a non-empty trajectory was produced.
    pub found_trajectory: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl<Sp: StateSpace> GraphDynamicPlanner<Sp> {
    /// Create a planner from validated parameters and its collaborators.
    pub fn new(
        params: Params,
        space: Sp,
        sub_planner: Box<dyn SubPlanner<Sp::State>>,
        cost: Box<dyn CostFn<Sp::State>>,
        clock: Box<dyn RunClock>,
    ) -> Result<Self, ParamsError> {
        params.validate()?;

        Ok(Self {
            params,
            space,
            sub_planner,
            cost,
            clock,
        })
    }

    /// Plan a trajectory from `start` to `goal` beginning at `start_time`.
    ///
    /// Returns a trajectory realising a recursively feasible path from the
    /// start to the goal, or a viable loop anchored at the start if the goal
    /// was not reached within the runtime budget, or an empty trajectory if
    /// neither exists. The call returns as soon as it has an answer; pacing
    /// the replanning cadence is the caller's concern.
    pub fn plan(
        &mut self,
        start: &Sp::State,
        goal: &Sp::State,
        start_time: f64,
    ) -> Trajectory<Sp::State> {
        let initial_call_time = self.clock.now_s();

        let mut arena = NodeArena::new();
        let start_id = arena.alloc(start.clone(), start_time, 0.0, true, None);
        let goal_id = arena.alloc(goal.clone(), f64::INFINITY, f64::INFINITY, true, None);

        let mut graph = SearchableSet::new(start_id, start);
        let goals = SearchableSet::new(goal_id, goal);

        let mut report = PlanReport::default();

        let traj = self.recursive_plan(
            &mut arena,
            &mut graph,
            &goals,
            start_time,
            true,
            initial_call_time,
            &mut report,
        );

        report.elapsed_s = self.clock.now_s() - initial_call_time;
        report.found_trajectory = !traj.is_empty();
        debug!(
            "Plan finished: {} samples, {} attached, {} escape calls, {:.3} s",
            report.num_samples, report.num_attached, report.num_escape_calls, report.elapsed_s
        );
        util::session::save_with_timestamp("graph_planner/report.json", &report);

        traj
    }

    /// One traversal of the recursive feasibility loop.
    ///
    /// Outbound traversals expand `graph` away from its initial node towards
    /// `goals` and extract a trajectory on success. Return traversals only
    /// witness viability for their initial node and always return an empty
    /// trajectory.
    #[allow(clippy::too_many_arguments)]
    fn recursive_plan(
        &mut self,
        arena: &mut NodeArena<Sp::State>,
        graph: &mut SearchableSet,
        goals: &SearchableSet,
        start_time: f64,
        outbound: bool,
        initial_call_time: f64,
        report: &mut PlanReport,
    ) -> Trajectory<Sp::State> {
        trace!(
            "{} traversal starting at t = {:.3}",
            if outbound { "Outbound" } else { "Return" },
            start_time
        );

        while self.clock.now_s() - initial_call_time < self.params.max_runtime_s {
            // (1) Sample a new point.
            let sample = self.space.sample();
            report.num_samples += 1;

            // (2) Nearest neighbours in the expansion graph.
            let neighbors = graph.knn_search(&sample, self.params.num_neighbors);

            // (3) Attach to the first neighbour admitting a feasible sub-plan.
            let mut sample_node = None;
            for neighbor_id in neighbors {
                let (neighbor_state, neighbor_time, neighbor_cost) = {
                    let n = &arena[neighbor_id];
                    (n.state.clone(), n.time, n.cost_to_come)
                };

                // A sample coinciding with an existing node is rejected
                if neighbor_state.is_approx(&sample, STATE_EPSILON) {
                    continue;
                }

                let sub = self
                    .sub_planner
                    .sub_plan(&neighbor_state, &sample, neighbor_time);
                if sub.is_empty() {
                    continue;
                }

                let time = neighbor_time + sub.duration();
                let cost = neighbor_cost + self.cost.cost(&sub);

                let id = arena.alloc(sample.clone(), time, cost, false, Some(neighbor_id));
                arena[neighbor_id].children.push(Edge { child: id, traj: sub });
                graph.insert(id, &sample);

                sample_node = Some(id);
                break;
            }

            let sample_id = match sample_node {
                Some(id) => id,
                None => continue,
            };
            report.num_attached += 1;

            // (4) Try to connect to a viable goal within the search radius.
            let near_goals = goals.radius_search(&sample, self.params.search_radius);

            let mut child = None;
            for goal_id in near_goals {
                if !arena[goal_id].is_viable {
                    continue;
                }

                let goal_state = arena[goal_id].state.clone();
                let sub = self
                    .sub_planner
                    .sub_plan(&sample, &goal_state, arena[sample_id].time);
                if sub.is_empty() {
                    continue;
                }

                arena[sample_id].children.push(Edge {
                    child: goal_id,
                    traj: sub,
                });

                child = Some(goal_id);
                break;
            }

            let child_id = match child {
                Some(id) => id,
                None => {
                    // (6) Stranded sample: on outbound traversals, recurse
                    // with the roles swapped to witness its viability. The
                    // returned trajectory is irrelevant.
                    if outbound {
                        report.num_escape_calls += 1;
                        debug!("No goal connection from sample, starting return traversal");

                        let escape_time = arena[sample_id].time;
                        let escape_state = arena[sample_id].state.clone();
                        let mut escape_graph = SearchableSet::new(sample_id, &escape_state);

                        let _ = self.recursive_plan(
                            arena,
                            &mut escape_graph,
                            graph,
                            escape_time,
                            false,
                            initial_call_time,
                            report,
                        );
                    }
                    continue;
                }
            };

            // (5) Reached a goal: rewire it onto the cheapest parent seen so
            // far, then mark the witnessing chain viable.
            let sample_cost = arena[sample_id].cost_to_come;
            let reattach = match arena[child_id].best_parent {
                None => true,
                Some(p) => arena[p].cost_to_come > sample_cost,
            };

            if reattach {
                arena[child_id].best_parent = Some(sample_id);

                let anchor = if outbound {
                    graph.initial_node()
                } else {
                    goals.initial_node()
                };
                self.update_descendants(arena, sample_id, anchor);
            }

            let mut current = Some(sample_id);
            while let Some(id) = current {
                if arena[id].is_viable {
                    break;
                }
                arena[id].is_viable = true;
                current = arena[id].best_parent;
            }

            if outbound {
                return self.extract_trajectory(arena, graph.initial_node(), goals.initial_node());
            } else {
                return Trajectory::new_empty();
            }
        }

        // Ran out of time.
        warn!(
            "Planner ran out of time after {:.3} s",
            self.clock.now_s() - initial_call_time
        );

        if !outbound {
            return Trajectory::new_empty();
        }

        let start_id = graph.initial_node();
        if arena[start_id].best_parent.is_none() {
            error!("No viable loops available");
            return Trajectory::new_empty();
        }

        info!("Returning a viable loop anchored at the start");
        self.extract_trajectory(arena, start_id, start_id)
    }

    /// Propagate best-parent, arrival-time and cost updates from `node`
    /// through its descendants.
    ///
    /// Breadth-first over children edges. A child is reattached when it has
    /// no parent or a strictly costlier one; a child already parented by the
    /// visited node has its time and cost refreshed. The anchor is the root
    /// of the active traversal: its time and cost are authoritative, so it is
    /// neither visited nor rewritten. Loop connections back to the anchor
    /// therefore stop the traversal, and only children parented by the
    /// visited node are followed further, so the search terminates even
    /// though the children edges may form cycles.
    fn update_descendants(
        &self,
        arena: &mut NodeArena<Sp::State>,
        node_id: NodeId,
        anchor: NodeId,
    ) {
        let mut queue = VecDeque::from([node_id]);

        while let Some(current_id) = queue.pop_front() {
            if current_id == anchor {
                continue;
            }

            let (current_time, current_cost, num_children) = {
                let n = &arena[current_id];
                (n.time, n.cost_to_come, n.children.len())
            };

            for i in 0..num_children {
                let (child_id, edge_duration, edge_cost) = {
                    let edge = &mut arena[current_id].children[i];
                    edge.traj.reset_first_time(current_time);
                    (edge.child, edge.traj.duration(), self.cost.cost(&edge.traj))
                };

                if child_id == anchor {
                    continue;
                }

                let update = match arena[child_id].best_parent {
                    None => true,
                    Some(p) if p == current_id => true,
                    Some(p) => arena[p].cost_to_come > current_cost,
                };

                if update {
                    let child = &mut arena[child_id];
                    child.best_parent = Some(current_id);
                    child.time = current_time + edge_duration;
                    child.cost_to_come = current_cost + edge_cost;

                    queue.push_back(child_id);
                }
            }
        }
    }

    /// Extract the trajectory from `start` to `goal` by walking best-parent
    /// links backwards and concatenating the edge sub-trajectories.
    ///
    /// When `start == goal` the walk continues until at least one edge has
    /// been accumulated, so a loop anchored at the start yields the full
    /// cycle.
    fn extract_trajectory(
        &self,
        arena: &NodeArena<Sp::State>,
        start_id: NodeId,
        goal_id: NodeId,
    ) -> Trajectory<Sp::State> {
        let mut pieces = Vec::new();
        let mut node_id = goal_id;

        loop {
            if node_id == start_id && !pieces.is_empty() {
                break;
            }

            let parent_id = match arena[node_id].best_parent {
                Some(p) => p,
                None => {
                    log_throttle!(
                        Level::Error,
                        ERROR_PERIOD_S,
                        "Trajectory extraction reached a node with no parent"
                    );
                    break;
                }
            };

            match arena[parent_id]
                .children
                .iter()
                .find(|e| e.child == node_id)
            {
                Some(edge) => pieces.push(edge.traj.clone()),
                None => {
                    log_throttle!(
                        Level::Error,
                        ERROR_PERIOD_S,
                        "Parent/child inconsistency during trajectory extraction"
                    );
                }
            }

            node_id = parent_id;
        }

        pieces.reverse();
        let traj = Trajectory::concatenate(&pieces);

        debug!(
            "Extracted trajectory with {} samples over {:.3} s",
            traj.size(),
            traj.duration()
        );

        traj
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::time::Instant;

    use approx::assert_relative_eq;

    use super::*;
    use crate::plan::{DurationCost, StraightLinePlanner, WallClock};
    use crate::space::{PositionVelocity, PositionVelocitySpace};

    fn pv(x: f64) -> PositionVelocity {
        PositionVelocity::from_components(x, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// A 1-D problem: samples along x in [0, 10], everything else pinned.
    fn line_space(seed: u64) -> PositionVelocitySpace {
        PositionVelocitySpace::new(pv(0.0), pv(10.0), seed)
    }

    fn line_planner(
        sub_planner: Box<dyn SubPlanner<PositionVelocity>>,
        max_runtime_s: f64,
        seed: u64,
    ) -> GraphDynamicPlanner<PositionVelocitySpace> {
        GraphDynamicPlanner::new(
            Params {
                search_radius: 100.0,
                num_neighbors: 2,
                max_runtime_s,
            },
            line_space(seed),
            sub_planner,
            Box::new(DurationCost),
            Box::new(WallClock::new()),
        )
        .unwrap()
    }

    /// Sub-planner that never finds a connection.
    struct FailingPlanner;

    impl SubPlanner<PositionVelocity> for FailingPlanner {
        fn sub_plan(
            &self,
            _from: &PositionVelocity,
            _to: &PositionVelocity,
            _start_time: f64,
        ) -> Trajectory<PositionVelocity> {
            Trajectory::new_empty()
        }
    }

    /// Sub-planner producing instantaneous (zero-duration) connections.
    struct TeleportPlanner;

    impl SubPlanner<PositionVelocity> for TeleportPlanner {
        fn sub_plan(
            &self,
            from: &PositionVelocity,
            to: &PositionVelocity,
            start_time: f64,
        ) -> Trajectory<PositionVelocity> {
            Trajectory::new(vec![*from, *to], vec![start_time, start_time])
        }
    }

    /// Straight-line sub-planner that refuses any connection ending at the
    /// blocked state, making that state unreachable.
    struct BlockedGoalPlanner {
        inner: StraightLinePlanner,
        blocked: PositionVelocity,
    }

    impl SubPlanner<PositionVelocity> for BlockedGoalPlanner {
        fn sub_plan(
            &self,
            from: &PositionVelocity,
            to: &PositionVelocity,
            start_time: f64,
        ) -> Trajectory<PositionVelocity> {
            if to.is_approx(&self.blocked, STATE_EPSILON) {
                Trajectory::new_empty()
            } else {
                self.inner.sub_plan(from, to, start_time)
            }
        }
    }

    fn assert_times_nondecreasing(traj: &Trajectory<PositionVelocity>) {
        for pair in traj.times().windows(2) {
            assert!(pair[1] >= pair[0], "times decreased: {:?}", pair);
        }
    }

    #[test]
    fn test_plan_straight_line() {
        let mut planner =
            line_planner(Box::new(StraightLinePlanner::new(1.0, 0.5)), 1.0, 11);

        let traj = planner.plan(&pv(0.0), &pv(10.0), 0.0);

        assert!(!traj.is_empty());
        // Any sample in [0, 10] lies on the segment, so the duration at unit
        // speed is exactly the start-goal distance.
        assert_relative_eq!(traj.duration(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(traj.first_state().unwrap().x(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(traj.last_state().unwrap().x(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(traj.first_time().unwrap(), 0.0);
        assert_times_nondecreasing(&traj);
    }

    #[test]
    fn test_plan_is_reproducible_for_a_fixed_seed() {
        let mut a = line_planner(Box::new(StraightLinePlanner::new(1.0, 0.5)), 5.0, 23);
        let mut b = line_planner(Box::new(StraightLinePlanner::new(1.0, 0.5)), 5.0, 23);

        assert_eq!(a.plan(&pv(0.0), &pv(10.0), 0.0), b.plan(&pv(0.0), &pv(10.0), 0.0));
    }

    #[test]
    fn test_plan_with_infeasible_subplanner_returns_empty() {
        let mut planner = line_planner(Box::new(FailingPlanner), 0.05, 5);

        let traj = planner.plan(&pv(0.0), &pv(10.0), 0.0);
        assert!(traj.is_empty());
    }

    #[test]
    fn test_plan_respects_deadline() {
        let mut planner = line_planner(Box::new(FailingPlanner), 0.2, 5);

        let before = Instant::now();
        let traj = planner.plan(&pv(0.0), &pv(10.0), 0.0);
        let elapsed = before.elapsed().as_secs_f64();

        assert!(traj.is_empty());
        assert!(elapsed < 1.0, "plan overran its budget: {} s", elapsed);
    }

    #[test]
    fn test_plan_start_equals_goal() {
        let mut planner = line_planner(Box::new(TeleportPlanner), 1.0, 3);

        let traj = planner.plan(&pv(4.0), &pv(4.0), 0.0);

        assert!(!traj.is_empty());
        assert_relative_eq!(traj.duration(), 0.0);
        assert_relative_eq!(traj.first_state().unwrap().x(), 4.0);
        assert_relative_eq!(traj.last_state().unwrap().x(), 4.0);
    }

    #[test]
    fn test_unreachable_goal_yields_viable_loop() {
        let sub = BlockedGoalPlanner {
            inner: StraightLinePlanner::new(1.0, 0.5),
            blocked: pv(10.0),
        };
        let mut planner = line_planner(Box::new(sub), 0.3, 29);

        let traj = planner.plan(&pv(2.0), &pv(10.0), 0.0);

        // The goal is unreachable, so the escape traversals must have built
        // a loop anchored at the start.
        assert!(!traj.is_empty());
        assert_relative_eq!(traj.first_state().unwrap().x(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(traj.last_state().unwrap().x(), 2.0, epsilon = 1e-9);
        assert_times_nondecreasing(&traj);
    }

    #[test]
    fn test_returned_chain_is_viable_and_acyclic() {
        let mut planner =
            line_planner(Box::new(StraightLinePlanner::new(1.0, 0.5)), 1.0, 17);

        let start = pv(0.0);
        let goal = pv(10.0);

        let initial_call_time = planner.clock.now_s();
        let mut arena = NodeArena::new();
        let start_id = arena.alloc(start, 0.0, 0.0, true, None);
        let goal_id = arena.alloc(goal, f64::INFINITY, f64::INFINITY, true, None);

        let mut graph = SearchableSet::new(start_id, &start);
        let goals = SearchableSet::new(goal_id, &goal);
        let mut report = PlanReport::default();

        let traj = planner.recursive_plan(
            &mut arena,
            &mut graph,
            &goals,
            0.0,
            true,
            initial_call_time,
            &mut report,
        );
        assert!(!traj.is_empty());

        // Walk the best-parent chain from the goal: it must stay viable and
        // terminate at the start without revisiting a node.
        let mut visited = std::collections::HashSet::new();
        let mut node_id = goal_id;
        loop {
            assert!(arena[node_id].is_viable);
            assert!(visited.insert(node_id), "best-parent chain has a cycle");

            if node_id == start_id {
                break;
            }
            node_id = arena[node_id].best_parent.expect("chain broke before the start");
        }
    }

    fn pv2(x: f64, y: f64) -> PositionVelocity {
        PositionVelocity::from_components(x, y, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_rewire_adopts_cheaper_parent_and_updates_descendants() {
        let planner = line_planner(Box::new(StraightLinePlanner::new(1.0, 0.5)), 1.0, 1);
        let line = StraightLinePlanner::new(1.0, 0.5);

        // Start -> M -> G chain taking a detour through M, with an extra
        // node H hanging off G.
        let m_g_dist = 65.0f64.sqrt();
        let old_g_cost = 5.0 + m_g_dist;

        let mut arena = NodeArena::new();
        let s = arena.alloc(pv2(0.0, 0.0), 0.0, 0.0, true, None);
        let m = arena.alloc(pv2(3.0, 4.0), 5.0, 5.0, true, Some(s));
        let g = arena.alloc(pv2(10.0, 0.0), old_g_cost, old_g_cost, true, Some(m));
        let h = arena.alloc(pv2(8.0, 0.0), old_g_cost + 2.0, old_g_cost + 2.0, false, Some(g));

        let s_m = line.sub_plan(&pv2(0.0, 0.0), &pv2(3.0, 4.0), 0.0);
        let m_g = line.sub_plan(&pv2(3.0, 4.0), &pv2(10.0, 0.0), 5.0);
        let g_h = line.sub_plan(&pv2(10.0, 0.0), &pv2(8.0, 0.0), old_g_cost);
        arena[s].children.push(Edge { child: m, traj: s_m });
        arena[m].children.push(Edge { child: g, traj: m_g });
        arena[g].children.push(Edge { child: h, traj: g_h });

        // A cheaper route to G appears: D on the direct line, cost 2 from S.
        let d = arena.alloc(pv2(2.0, 0.0), 2.0, 2.0, false, Some(s));
        let s_d = line.sub_plan(&pv2(0.0, 0.0), &pv2(2.0, 0.0), 0.0);
        let d_g = line.sub_plan(&pv2(2.0, 0.0), &pv2(10.0, 0.0), 2.0);
        arena[s].children.push(Edge { child: d, traj: s_d });
        arena[d].children.push(Edge { child: g, traj: d_g });

        // D (cost 2) beats G's current parent M (cost 5), so G reattaches.
        arena[g].best_parent = Some(d);
        planner.update_descendants(&mut arena, d, s);

        assert_eq!(arena[g].best_parent, Some(d));
        assert!(arena[g].cost_to_come < old_g_cost);
        assert_relative_eq!(arena[g].cost_to_come, 10.0);
        assert_relative_eq!(arena[g].time, 10.0);

        // The update propagates through G to its descendant H.
        assert_eq!(arena[h].best_parent, Some(g));
        assert_relative_eq!(arena[h].time, 12.0);
        assert_relative_eq!(arena[h].cost_to_come, 12.0);

        // M keeps its place in the graph but is off the best-parent chain.
        assert_eq!(arena[m].best_parent, Some(s));
        assert_eq!(arena[s].children[0].child, m);
    }

    #[test]
    fn test_update_descendants_skips_costlier_reattachment() {
        let planner = line_planner(Box::new(StraightLinePlanner::new(1.0, 0.5)), 1.0, 1);
        let line = StraightLinePlanner::new(1.0, 0.5);

        // G already has a cheap parent; a costlier candidate must not steal it.
        let mut arena = NodeArena::new();
        let s = arena.alloc(pv(0.0), 0.0, 0.0, true, None);
        let cheap = arena.alloc(pv(1.0), 1.0, 1.0, true, Some(s));
        let g = arena.alloc(pv(10.0), 10.0, 10.0, true, Some(cheap));
        let costly = arena.alloc(pv(9.0), 9.0, 9.0, false, Some(s));

        let c_g = line.sub_plan(&pv(9.0), &pv(10.0), 9.0);
        arena[costly].children.push(Edge { child: g, traj: c_g });

        planner.update_descendants(&mut arena, costly, s);

        assert_eq!(arena[g].best_parent, Some(cheap));
        assert_relative_eq!(arena[g].cost_to_come, 10.0);
    }

    #[test]
    fn test_invalid_params_fail_construction() {
        let result = GraphDynamicPlanner::new(
            Params {
                search_radius: 1.0,
                num_neighbors: 0,
                max_runtime_s: 1.0,
            },
            line_space(0),
            Box::new(FailingPlanner),
            Box::new(DurationCost),
            Box::new(WallClock::new()),
        );

        assert!(result.is_err());
    }
}

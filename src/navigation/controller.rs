// src/navigation/controller.rs
// Flies a planned path one leg at a time. Before every leg the vehicle turns
// toward the next waypoint, one frame is captured and the depth gate decides.
// A blocked leg loses its edge and the path is re-planned from wherever the
// vehicle reports it is. This is the only place the graph is mutated or
// motion is commanded.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::NavigationConfig;
use super::grid::{Graph, NodeId};
use super::planner::{Path, shortest_path};
use crate::core::perception::{ClearanceResult, DepthGate, Verdict};
use crate::core::state::{MissionState, MissionStateMachine};
use crate::error::NavError;
use crate::interface::{Camera, DepthEstimator, Vehicle};

/// Shared flag that cancels a mission at its next state boundary.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once `trigger` was called.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened during one mission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightLog {
    /// Nodes the vehicle stood on, starting node first.
    pub visited: Vec<NodeId>,
    /// Legs actually flown.
    pub legs_flown: usize,
    /// Paths handed out by the planner, initial path first.
    pub paths: Vec<Vec<NodeId>>,
    /// Number of re-plans after obstructions.
    pub replans: usize,
    /// Edges removed after blocked verdicts, as `(from, to)`.
    pub removed_edges: Vec<(NodeId, NodeId)>,
    /// Nodes removed by obstruction escalation.
    pub removed_nodes: Vec<NodeId>,
    /// Every successful clearance check, in order.
    pub clearances: Vec<ClearanceResult>,
    /// Mission states in the order they were entered.
    pub states: Vec<MissionState>,
}

/// How a mission ended, as reported to the user.
#[derive(Debug)]
pub enum MissionOutcome {
    /// The destination was reached.
    Arrived(FlightLog),
    /// The mission stopped early; the vehicle was told to land.
    Aborted(NavError),
    /// The mission could not start because its inputs were invalid.
    ConfigurationError(NavError),
}

impl MissionOutcome {
    /// True for `Arrived`.
    pub fn arrived(&self) -> bool {
        matches!(self, MissionOutcome::Arrived(_))
    }
}

/// Navigation controller for one mission.
pub struct Navigator<E> {
    graph: Graph,
    gate: DepthGate<E>,
    config: NavigationConfig,
    fsm: MissionStateMachine,
    log: FlightLog,
    blocks_into: BTreeMap<NodeId, u32>,
    abort: AbortSignal,
    airborne: bool,
}

impl<E: DepthEstimator> Navigator<E> {
    /// Takes ownership of the graph for the duration of the mission.
    pub fn new(graph: Graph, gate: DepthGate<E>, config: NavigationConfig) -> Self {
        Navigator {
            graph,
            gate,
            config,
            fsm: MissionStateMachine::new(),
            log: FlightLog::default(),
            blocks_into: BTreeMap::new(),
            abort: AbortSignal::new(),
            airborne: false,
        }
    }

    /// Replaces the abort signal, e.g. with one wired to a signal handler.
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Handle that cancels this mission.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Graph as currently known, obstructions removed.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current mission state.
    pub fn state(&self) -> MissionState {
        self.fsm.current()
    }

    /// Flight log so far.
    pub fn flight_log(&self) -> &FlightLog {
        &self.log
    }

    /// Flies from the vehicle's current waypoint to the graph's destination.
    ///
    /// Every fatal condition ends in `Aborted` after a best-effort landing.
    pub fn fly<V, C>(&mut self, vehicle: &mut V, camera: &mut C) -> MissionOutcome
    where
        V: Vehicle + ?Sized,
        C: Camera + ?Sized,
    {
        let result = self.execute(vehicle, camera);
        let outcome = match result {
            Ok(()) => {
                self.log.states = self.fsm.history().to_vec();
                MissionOutcome::Arrived(self.log.clone())
            }
            Err(err) => self.abort_mission(vehicle, err),
        };
        self.log.states = self.fsm.history().to_vec();
        outcome
    }

    fn execute<V, C>(&mut self, vehicle: &mut V, camera: &mut C) -> Result<(), NavError>
    where
        V: Vehicle + ?Sized,
        C: Camera + ?Sized,
    {
        self.checkpoint()?;
        self.fsm.advance(MissionState::Planning)?;
        let destination = self
            .graph
            .destination()
            .ok_or_else(|| NavError::config("graph has no destination node"))?;

        let mut current = self.anchor(vehicle)?;
        let mut path = self.plan(current, destination)?;
        self.log.visited.push(current);
        self.fsm.advance(MissionState::Traversing)?;

        if path.legs() > 0 {
            // With takeoff disabled the vehicle is taken to be flying already.
            self.airborne = true;
            if self.config.takeoff {
                vehicle.takeoff()?;
                info!("Airborne at node {}", current);
            }
        }

        let mut cursor = 0;
        while current != destination {
            self.checkpoint()?;
            let next = path.nodes()[cursor + 1];
            let target = self.graph.node(next)?.position;
            vehicle.face_towards(target)?;

            self.fsm.advance(MissionState::CheckingClearance)?;
            match self.assess_leg(camera, current, next) {
                Verdict::Clear => {
                    info!("Leg {} -> {} clear, moving to ({:.2}, {:.2})", current, next, target.x, target.y);
                    vehicle.move_to(target)?;
                    cursor += 1;
                    current = next;
                    self.log.legs_flown += 1;
                    self.log.visited.push(current);
                    if current != destination {
                        self.fsm.advance(MissionState::Traversing)?;
                    }
                }
                Verdict::Blocked => {
                    self.record_obstruction(current, next, destination);
                    self.fsm.advance(MissionState::Replanning)?;
                    self.checkpoint()?;
                    let anchored = self.anchor(vehicle)?;
                    if anchored != current {
                        warn!("Vehicle reports node {} while controller expected {}", anchored, current);
                        current = anchored;
                    }
                    path = self.plan(current, destination)?;
                    cursor = 0;
                    self.log.replans += 1;
                    self.fsm.advance(MissionState::Traversing)?;
                }
            }
        }

        self.fsm.advance(MissionState::Arrived)?;
        info!(
            "Arrived at destination node {} after {} legs and {} re-plans",
            destination, self.log.legs_flown, self.log.replans
        );
        if self.airborne {
            if let Err(err) = vehicle.land() {
                error!("Landing after arrival failed: {}", err);
            }
            self.airborne = false;
        }
        Ok(())
    }

    /// Captures one frame and runs the depth gate, retrying a failed capture
    /// `capture_retries` times. Anything short of a usable frame counts as blocked.
    fn assess_leg<C: Camera + ?Sized>(&mut self, camera: &mut C, from: NodeId, to: NodeId) -> Verdict {
        let attempts = self.config.capture_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let checked = camera.capture_frame().and_then(|frame| self.gate.check(&frame));
            match checked {
                Ok(result) => {
                    info!(
                        "Leg {} -> {}: {:?} (nearest depth {:.3})",
                        from, to, result.verdict, result.min_depth
                    );
                    debug!(
                        "Leg {} -> {}: open {:?} by sector (left {:.2}, centre {:.2}, right {:.2}), {:?} by sample points",
                        from,
                        to,
                        result.suggested,
                        result.sectors.left,
                        result.sectors.center,
                        result.sectors.right,
                        result.points.suggest()
                    );
                    self.log.clearances.push(result);
                    return result.verdict;
                }
                Err(err) => warn!(
                    "Leg {} -> {}: capture attempt {}/{} failed: {}",
                    from, to, attempt, attempts, err
                ),
            }
        }
        warn!("Leg {} -> {}: no usable frame, treating as blocked", from, to);
        Verdict::Blocked
    }

    fn record_obstruction(&mut self, from: NodeId, to: NodeId, destination: NodeId) {
        if self.graph.remove_edge(from, to) {
            warn!("Removed blocked edge {} -> {}", from, to);
            self.log.removed_edges.push((from, to));
        }

        let blocks = self.blocks_into.entry(to).or_insert(0);
        *blocks += 1;
        let over_limit = self.config.node_block_limit.is_some_and(|limit| *blocks >= limit);
        let isolated = self.graph.degree(to) == 0;
        if to != destination && (isolated || over_limit) && self.graph.remove_node(to).is_some() {
            warn!(
                "Removed node {} ({})",
                to,
                if isolated { "isolated" } else { "repeatedly blocked" }
            );
            self.log.removed_nodes.push(to);
        }
    }

    /// Maps the vehicle's reported position onto a waypoint.
    fn anchor<V: Vehicle + ?Sized>(&self, vehicle: &V) -> Result<NodeId, NavError> {
        let position = vehicle.current_position()?;
        self.graph.locate(&position)
    }

    fn plan(&mut self, from: NodeId, to: NodeId) -> Result<Path, NavError> {
        let path = shortest_path(&self.graph, from, to)?;
        info!("Planned path {:?} (cost {:.3})", path.nodes(), path.cost());
        self.log.paths.push(path.nodes().to_vec());
        Ok(path)
    }

    fn checkpoint(&self) -> Result<(), NavError> {
        if self.abort.is_triggered() {
            return Err(NavError::Cancelled);
        }
        Ok(())
    }

    fn abort_mission<V: Vehicle + ?Sized>(&mut self, vehicle: &mut V, reason: NavError) -> MissionOutcome {
        error!("Aborting mission in {:?}: {}", self.fsm.current(), reason);
        if self.airborne {
            match vehicle.land() {
                Ok(()) => info!("Safe landing commanded"),
                Err(err) => error!("Safe landing failed: {}", err),
            }
            self.airborne = false;
        }
        if let Err(err) = self.fsm.advance(MissionState::Aborted) {
            warn!("Abort left state machine untouched: {}", err);
        }
        MissionOutcome::Aborted(reason)
    }
}

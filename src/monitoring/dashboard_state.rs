// dashboard_state.rs
//
// The poller's owned state and the transitions of its state machine. Every
// transition is a plain method so the merge and ordering rules can be tested
// without a runtime.

use crate::error::DashboardError;
use crate::shared_data::{CityMap, RoadConditions, SuggestedRoute, SystemState, TrafficLight, Vehicle};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollerPhase {
    /// No map committed.
    Uninitialized,
    /// A map submission is in flight.
    Loading,
    Ready,
    /// Ready, with a refresh cycle in flight.
    Updating,
    Stopped,
}

/// One of the dynamic fetches of a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endpoint {
    SystemState,
    RoadConditions,
    Vehicles,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Endpoint::SystemState => write!(f, "simulation state"),
            Endpoint::RoadConditions => write!(f, "road conditions"),
            Endpoint::Vehicles => write!(f, "vehicle list"),
        }
    }
}

/// How a refresh cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RefreshOutcome {
    Complete,
    /// Some, but not all, fetches failed.
    Partial { failed: Vec<Endpoint> },
    /// Every fetch failed; nothing was modified.
    Total,
    /// Results arrived for a superseded cycle or after stop and were ignored.
    Discarded,
    /// The cycle did not settle in time and was given up.
    TimedOut,
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Complete => "complete",
            RefreshOutcome::Partial { .. } => "partial",
            RefreshOutcome::Total => "total_failure",
            RefreshOutcome::Discarded => "discarded",
            RefreshOutcome::TimedOut => "timed_out",
        }
    }
}

/// Proof that a cycle was started; results are only applied for the newest ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTicket {
    id: u64,
}

impl CycleTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Settled results of one fan-out.
#[derive(Debug)]
pub struct CycleResults {
    pub system_state: Result<SystemState, DashboardError>,
    pub road_conditions: Result<RoadConditions, DashboardError>,
    /// `None` when the vehicle list was not requested this cycle.
    pub vehicles: Option<Result<Vec<Vehicle>, DashboardError>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub phase: PollerPhase,
    #[serde(skip)]
    pub map: Option<Arc<CityMap>>,
    pub simulation_time: Option<f64>,
    pub traffic_lights: Vec<TrafficLight>,
    pub routes: Vec<SuggestedRoute>,
    pub vehicles: Vec<Vehicle>,
    pub road_conditions: RoadConditions,
    /// The single user-visible error message.
    pub error: Option<String>,
    pub last_outcome: Option<RefreshOutcome>,
    /// Id of the most recently started cycle.
    pub cycles_started: u64,
    /// Cycles whose results were applied (fully or partially) or rejected as total failures.
    pub cycles_settled: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            phase: PollerPhase::Uninitialized,
            map: None,
            simulation_time: None,
            traffic_lights: Vec::new(),
            routes: Vec::new(),
            vehicles: Vec::new(),
            road_conditions: RoadConditions::new(),
            error: None,
            last_outcome: None,
            cycles_started: 0,
            cycles_settled: 0,
        }
    }

    pub fn is_updating(&self) -> bool {
        self.phase == PollerPhase::Updating
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == PollerPhase::Stopped
    }

    fn clear_dynamic(&mut self) {
        self.simulation_time = None;
        self.traffic_lights.clear();
        self.routes.clear();
        self.vehicles.clear();
        self.road_conditions.clear();
    }

    pub fn begin_map_load(&mut self) {
        if self.is_stopped() {
            return;
        }
        self.phase = PollerPhase::Loading;
    }

    /// The service accepted `map`: commit it and drop state that belonged to the old map.
    pub fn commit_map(&mut self, map: Arc<CityMap>) {
        if self.is_stopped() {
            return;
        }
        self.map = Some(map);
        self.clear_dynamic();
        self.error = None;
        self.phase = PollerPhase::Ready;
    }

    pub fn fail_map_load(&mut self, error: &DashboardError) {
        if self.is_stopped() {
            return;
        }
        self.map = None;
        self.clear_dynamic();
        self.error = Some(error.to_string());
        self.phase = PollerPhase::Uninitialized;
    }

    /// Starts a refresh cycle if a map is loaded and no cycle is in flight.
    pub fn begin_cycle(&mut self) -> Option<CycleTicket> {
        if self.phase != PollerPhase::Ready || self.map.is_none() {
            return None;
        }
        self.cycles_started += 1;
        self.phase = PollerPhase::Updating;
        Some(CycleTicket {
            id: self.cycles_started,
        })
    }

    /// Gives up on an in-flight cycle; any results it later produces are stale.
    pub fn abandon_cycle(&mut self, ticket: CycleTicket) {
        if ticket.id != self.cycles_started || self.phase != PollerPhase::Updating {
            return;
        }
        self.error = Some("Refresh timed out".to_string());
        self.last_outcome = Some(RefreshOutcome::TimedOut);
        self.phase = PollerPhase::Ready;
    }

    /// Merges the settled results of the cycle identified by `ticket`.
    pub fn apply_cycle(&mut self, ticket: CycleTicket, results: CycleResults) -> RefreshOutcome {
        if self.is_stopped() || ticket.id != self.cycles_started || self.phase != PollerPhase::Updating {
            return RefreshOutcome::Discarded;
        }

        let CycleResults {
            system_state,
            road_conditions,
            vehicles,
        } = results;

        let attempted = 2 + usize::from(vehicles.is_some());
        let mut failures: Vec<(Endpoint, DashboardError)> = Vec::new();

        let system_state = system_state.map_err(|e| failures.push((Endpoint::SystemState, e))).ok();
        let road_conditions = road_conditions
            .map_err(|e| failures.push((Endpoint::RoadConditions, e)))
            .ok();
        let vehicles = vehicles.and_then(|r| r.map_err(|e| failures.push((Endpoint::Vehicles, e))).ok());

        self.phase = PollerPhase::Ready;
        self.cycles_settled += 1;

        let outcome = if failures.len() == attempted {
            let (endpoint, error) = &failures[0];
            self.error = Some(format!("Refresh failed: {} unavailable ({})", endpoint, error));
            RefreshOutcome::Total
        } else {
            if let Some(state) = system_state {
                self.simulation_time = Some(state.simulation_time);
                self.traffic_lights = state.traffic_lights;
                self.routes = state.routes;
                if let Some(embedded) = state.vehicles {
                    self.vehicles = embedded;
                }
            }
            if let Some(list) = vehicles {
                self.vehicles = list;
            }
            match road_conditions {
                Some(conditions) => self.road_conditions = conditions,
                // Never show conditions known to be out of date under an error banner.
                None => self.road_conditions.clear(),
            }

            if failures.is_empty() {
                self.error = None;
                RefreshOutcome::Complete
            } else {
                let detail: Vec<String> = failures
                    .iter()
                    .map(|(endpoint, error)| format!("{} unavailable ({})", endpoint, error))
                    .collect();
                self.error = Some(format!("Partial refresh failure: {}", detail.join("; ")));
                RefreshOutcome::Partial {
                    failed: failures.iter().map(|(endpoint, _)| *endpoint).collect(),
                }
            }
        };

        self.last_outcome = Some(outcome.clone());
        outcome
    }

    pub fn stop(&mut self) {
        self.phase = PollerPhase::Stopped;
    }
}

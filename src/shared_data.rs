// src/shared_data.rs

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of an intersection in the loaded map.
pub type NodeId = String;

/// Live conditions keyed by road id (`"source-target"`).
pub type RoadConditions = HashMap<String, RoadCondition>;

/// Canvas position of every laid-out node.
pub type Layout = HashMap<NodeId, Point>;

/// Builds the canonical road id joining an edge to its condition entry.
pub fn road_id(source: &str, target: &str) -> String {
    format!("{}-{}", source, target)
}

/// An intersection (node) of the road network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Optional absolute coordinates in an arbitrary source space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x: None,
            y: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Both coordinates, if present and finite.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        }
    }
}

fn default_base_travel_time() -> f64 {
    10.0
}

/// A directed road segment between two intersections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Free-flow travel time in seconds, required by the service's map loader.
    #[serde(default = "default_base_travel_time")]
    pub base_travel_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            base_travel_time: default_base_travel_time(),
            capacity: None,
        }
    }

    pub fn road_id(&self) -> String {
        road_id(&self.source, &self.target)
    }
}

/// Load-map payload, also the on-disk format of map presets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityMap {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl CityMap {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Accepts any JSON value and keeps it only if it is a number.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|v| !v.is_nan()))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.min(u32::MAX as f64) as u32)
        .unwrap_or(0))
}

/// Live snapshot for one road.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadCondition {
    /// 0.0 (clear) to 1.0 (jammed); absent or invalid values decode to `None`.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_congestion: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub current_vehicles: u32,
    /// Seconds needed to traverse the road at the current congestion.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_travel_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub base_travel_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleState {
    Idle,
    OnRoute,
    Arrived,
    #[default]
    #[serde(other)]
    Other,
}

/// The service's authoritative description of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    #[serde(default)]
    pub state: VehicleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node_id: Option<NodeId>,
    pub current_node_id: NodeId,
    pub destination_node_id: NodeId,
    #[serde(default)]
    pub current_road_segment: Option<(NodeId, NodeId)>,
    #[serde(default)]
    pub time_on_current_segment: Option<f64>,
    #[serde(default)]
    pub current_path: Option<Vec<NodeId>>,
    #[serde(default)]
    pub current_path_index: Option<usize>,
    #[serde(default)]
    pub path_cost: Option<f64>,
}

impl Vehicle {
    /// An idle vehicle parked at `node`.
    pub fn parked(id: impl Into<String>, node: impl Into<String>) -> Self {
        let node = node.into();
        Self {
            id: id.into(),
            state: VehicleState::Idle,
            start_node_id: None,
            current_node_id: node.clone(),
            destination_node_id: node,
            current_road_segment: None,
            time_on_current_segment: None,
            current_path: None,
            current_path_index: None,
            path_cost: None,
        }
    }

    pub fn is_on_route(&self) -> bool {
        self.state == VehicleState::OnRoute
    }
}

/// Green time per incoming road at one intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficLight {
    pub intersection_id: NodeId,
    #[serde(default)]
    pub green_times: HashMap<String, u32>,
}

impl TrafficLight {
    pub fn cycle_seconds(&self) -> u32 {
        self.green_times.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedRoute {
    #[serde(default)]
    pub vehicle_id: Option<String>,
    pub path: Vec<NodeId>,
    pub estimated_travel_time: f64,
}

/// Response of the system-state endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub simulation_time: f64,
    #[serde(default)]
    pub traffic_lights: Vec<TrafficLight>,
    #[serde(default)]
    pub vehicles: Option<Vec<Vehicle>>,
    #[serde(default)]
    pub routes: Vec<SuggestedRoute>,
}

/// Manual congestion override for one road.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficUpdate {
    pub road_id: String,
    pub congestion_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start_node_id: NodeId,
    pub end_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerouteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_start_node_id: Option<NodeId>,
}

/// A position in canvas pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn road_condition_tolerates_invalid_numbers() {
        let json = r#"{
            "A-B": {"current_congestion": "n/a", "current_vehicles": 3, "current_travel_time": 12.5},
            "B-C": {"current_vehicles": null}
        }"#;
        let conditions: RoadConditions = serde_json::from_str(json).unwrap();

        let ab = &conditions["A-B"];
        assert_eq!(ab.current_congestion, None);
        assert_eq!(ab.current_vehicles, 3);
        assert_eq!(ab.current_travel_time, Some(12.5));

        let bc = &conditions["B-C"];
        assert_eq!(bc.current_vehicles, 0);
        assert_eq!(bc.current_travel_time, None);
    }

    #[test]
    fn vehicle_decodes_service_payload() {
        let json = r#"{
            "id": "veh_1",
            "state": "on_route",
            "start_node_id": "A",
            "current_node_id": "A",
            "destination_node_id": "C",
            "current_road_segment": ["A", "B"],
            "time_on_current_segment": 4.0,
            "current_path": ["A", "B", "C"],
            "current_path_index": 0,
            "path_cost": 30.0
        }"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert!(vehicle.is_on_route());
        assert_eq!(
            vehicle.current_road_segment,
            Some(("A".to_string(), "B".to_string()))
        );
        assert_eq!(vehicle.current_path.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn unknown_vehicle_state_is_other() {
        let json = r#"{"id": "v", "state": "waiting", "current_node_id": "A", "destination_node_id": "B"}"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.state, VehicleState::Other);
        assert_eq!(vehicle.time_on_current_segment, None);
    }

    #[test]
    fn edge_road_id_and_default_travel_time() {
        let edge: Edge = serde_json::from_str(r#"{"source": "A", "target": "B"}"#).unwrap();
        assert_eq!(edge.road_id(), "A-B");
        assert_eq!(edge.base_travel_time, 10.0);
    }

    #[test]
    fn node_coordinates_require_both_axes() {
        assert_eq!(Node::new("A", "A").at(1.0, 2.0).coordinates(), Some((1.0, 2.0)));
        let mut half = Node::new("B", "B");
        half.x = Some(3.0);
        assert_eq!(half.coordinates(), None);
    }
}

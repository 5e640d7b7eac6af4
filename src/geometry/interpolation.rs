use crate::shared_data::{road_id, Layout, Point, RoadConditions, Vehicle};
use serde::Serialize;

/// Where a vehicle is drawn in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehiclePosition {
    pub x: f64,
    pub y: f64,
    pub heading_degrees: f64,
}

/// Progress used when no usable travel time is known.
pub const UNKNOWN_PROGRESS: f64 = 0.5;

/// Expected seconds to traverse `source -> target`.
///
/// Prefers the live travel time of the road; otherwise averages the
/// vehicle's path cost over the segments of its path.
pub fn segment_travel_time(
    vehicle: &Vehicle,
    source: &str,
    target: &str,
    conditions: &RoadConditions,
) -> Option<f64> {
    let live = conditions
        .get(&road_id(source, target))
        .and_then(|c| c.current_travel_time)
        .filter(|t| t.is_finite() && *t > 0.0);
    if live.is_some() {
        return live;
    }

    let path_len = vehicle.current_path.as_ref().map(Vec::len).unwrap_or(0);
    vehicle
        .path_cost
        .map(|cost| cost / path_len.max(1) as f64)
        .filter(|t| t.is_finite() && *t > 0.0)
}

/// Fraction of the current segment already covered, in `[0, 1]`.
pub fn segment_progress(elapsed: Option<f64>, travel_time: Option<f64>) -> f64 {
    match travel_time {
        Some(total) if total > 0.0 => {
            let elapsed = elapsed.filter(|e| e.is_finite()).unwrap_or(0.0);
            (elapsed / total).clamp(0.0, 1.0)
        }
        _ => UNKNOWN_PROGRESS,
    }
}

fn lerp(from: Point, to: Point, t: f64) -> Point {
    Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

/// Places `vehicle` on the canvas, or `None` when none of its nodes are laid out.
pub fn vehicle_position(
    vehicle: &Vehicle,
    layout: &Layout,
    conditions: &RoadConditions,
) -> Option<VehiclePosition> {
    if vehicle.is_on_route() {
        if let Some((source, target)) = &vehicle.current_road_segment {
            if let (Some(&from), Some(&to)) = (layout.get(source), layout.get(target)) {
                let travel_time = segment_travel_time(vehicle, source, target, conditions);
                let progress = segment_progress(vehicle.time_on_current_segment, travel_time);
                let at = lerp(from, to, progress);
                let heading = (to.y - from.y).atan2(to.x - from.x).to_degrees();
                return Some(VehiclePosition {
                    x: at.x,
                    y: at.y,
                    heading_degrees: heading,
                });
            }
        }
    }

    layout.get(&vehicle.current_node_id).map(|p| VehiclePosition {
        x: p.x,
        y: p.y,
        heading_degrees: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_data::{RoadCondition, VehicleState};

    fn layout() -> Layout {
        let mut layout = Layout::new();
        layout.insert("S".to_string(), Point::new(0.0, 0.0));
        layout.insert("T".to_string(), Point::new(10.0, 0.0));
        layout.insert("U".to_string(), Point::new(10.0, 10.0));
        layout
    }

    fn conditions_with(road: &str, travel_time: Option<f64>) -> RoadConditions {
        let mut conditions = RoadConditions::new();
        conditions.insert(
            road.to_string(),
            RoadCondition {
                current_travel_time: travel_time,
                ..RoadCondition::default()
            },
        );
        conditions
    }

    fn moving(source: &str, target: &str, elapsed: f64) -> Vehicle {
        let mut v = Vehicle::parked("v1", source);
        v.state = VehicleState::OnRoute;
        v.current_road_segment = Some((source.to_string(), target.to_string()));
        v.time_on_current_segment = Some(elapsed);
        v
    }

    #[test]
    fn halfway_along_segment() {
        let v = moving("S", "T", 5.0);
        let pos = vehicle_position(&v, &layout(), &conditions_with("S-T", Some(10.0))).unwrap();
        assert_eq!((pos.x, pos.y), (5.0, 0.0));
        assert_eq!(pos.heading_degrees, 0.0);
    }

    #[test]
    fn progress_clamps_at_target() {
        let v = moving("S", "T", 20.0);
        let pos = vehicle_position(&v, &layout(), &conditions_with("S-T", Some(10.0))).unwrap();
        assert_eq!((pos.x, pos.y), (10.0, 0.0));
    }

    #[test]
    fn heading_follows_segment_direction() {
        let v = moving("T", "U", 0.0);
        let pos = vehicle_position(&v, &layout(), &conditions_with("T-U", Some(4.0))).unwrap();
        assert_eq!((pos.x, pos.y), (10.0, 0.0));
        assert!((pos.heading_degrees - 90.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_average_path_cost() {
        let mut v = moving("S", "T", 2.0);
        v.current_path = Some(vec!["S".into(), "T".into(), "U".into(), "S".into()]);
        v.path_cost = Some(32.0);
        // 32 / 4 = 8 seconds per segment; the live value is not positive.
        let conditions = conditions_with("S-T", Some(0.0));
        assert_eq!(segment_travel_time(&v, "S", "T", &conditions), Some(8.0));
        let pos = vehicle_position(&v, &layout(), &conditions).unwrap();
        assert!((pos.x - 2.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_travel_time_uses_midpoint() {
        let v = moving("S", "T", 3.0);
        let pos = vehicle_position(&v, &layout(), &RoadConditions::new()).unwrap();
        assert_eq!((pos.x, pos.y), (5.0, 0.0));
    }

    #[test]
    fn missing_segment_node_places_vehicle_at_current_node() {
        let v = moving("S", "GONE", 3.0);
        let pos = vehicle_position(&v, &layout(), &RoadConditions::new()).unwrap();
        assert_eq!(pos, VehiclePosition { x: 0.0, y: 0.0, heading_degrees: 0.0 });
    }

    #[test]
    fn idle_vehicle_sits_on_its_node() {
        let mut v = moving("S", "T", 5.0);
        v.state = VehicleState::Idle;
        v.current_node_id = "U".into();
        let pos = vehicle_position(&v, &layout(), &conditions_with("S-T", Some(10.0))).unwrap();
        assert_eq!((pos.x, pos.y, pos.heading_degrees), (10.0, 10.0, 0.0));
    }

    #[test]
    fn unknown_nodes_omit_vehicle() {
        let v = Vehicle::parked("v9", "NOWHERE");
        assert_eq!(vehicle_position(&v, &layout(), &RoadConditions::new()), None);
    }
}

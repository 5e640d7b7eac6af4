// scene.rs
//
// Builds the draw layers of one frame from the current state. Nothing here
// owns state: the same input always yields the same scene.

use crate::flow_analyzer::classify;
use crate::geometry::interpolation::vehicle_position;
use crate::global_variables::NODE_RADIUS;
use crate::monitoring::DashboardState;
use crate::shared_data::{
    Edge, Layout, Node, NodeId, Point, RoadConditions, SuggestedRoute, TrafficLight, Vehicle, VehicleState,
};
use serde::Serialize;
use std::collections::HashMap;

pub const EDGE_WIDTH: f64 = 3.0;
pub const PATH_WIDTH: f64 = 2.0;
/// Distinct offsets used to separate overlapping paths.
pub const PATH_OFFSET_SLOTS: usize = 4;
pub const PATH_OFFSET_STEP: f64 = 2.0;
pub const LABEL_SIZE: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

const NODE_FILL: Rgb = Rgb(70, 110, 200);
const NODE_STROKE: Rgb = Rgb(30, 40, 70);
const LABEL_COLOR: Rgb = Rgb(20, 20, 20);
const PATH_PALETTE: [Rgb; 4] = [
    Rgb(31, 119, 180),
    Rgb(148, 103, 189),
    Rgb(23, 190, 207),
    Rgb(227, 119, 194),
];

fn vehicle_color(state: VehicleState) -> Rgb {
    match state {
        VehicleState::OnRoute => Rgb(20, 80, 220),
        VehicleState::Idle => Rgb(120, 120, 120),
        VehicleState::Arrived => Rgb(40, 150, 60),
        VehicleState::Other => Rgb(140, 70, 160),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Primitive {
    Line {
        from: Point,
        to: Point,
        color: Rgb,
        width: f64,
    },
    Polyline {
        points: Vec<Point>,
        color: Rgb,
        width: f64,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Rgb,
        stroke: Option<Rgb>,
    },
    Polygon {
        points: Vec<Point>,
        fill: Rgb,
    },
    /// Children are expressed relative to `translate`, rotated by `rotate_degrees`.
    Group {
        translate: Point,
        rotate_degrees: f64,
        children: Vec<Primitive>,
    },
    Text {
        position: Point,
        text: String,
        size: f64,
        color: Rgb,
    },
}

/// Layers in draw order; later layers are drawn on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LayerKind {
    Edges,
    Paths,
    Nodes,
    Vehicles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub kind: LayerKind,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
}

impl Scene {
    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }
}

/// Read-only view of everything a frame depends on.
#[derive(Debug, Clone, Copy)]
pub struct SceneInput<'a> {
    pub nodes: &'a [Node],
    pub edges: &'a [Edge],
    pub vehicles: &'a [Vehicle],
    /// Suggested routes from the system state, keyed by vehicle id.
    pub routes: &'a [SuggestedRoute],
    pub conditions: &'a RoadConditions,
    pub traffic_lights: &'a [TrafficLight],
    pub layout: &'a Layout,
    pub width: u32,
    pub height: u32,
}

impl<'a> SceneInput<'a> {
    pub fn from_state(state: &'a DashboardState, layout: &'a Layout, width: u32, height: u32) -> Self {
        let (nodes, edges) = match &state.map {
            Some(map) => (map.nodes.as_slice(), map.edges.as_slice()),
            None => (&[][..], &[][..]),
        };
        Self {
            nodes,
            edges,
            vehicles: &state.vehicles,
            routes: &state.routes,
            conditions: &state.road_conditions,
            traffic_lights: &state.traffic_lights,
            layout,
            width,
            height,
        }
    }
}

fn edges_layer(input: &SceneInput) -> Layer {
    let primitives = input
        .edges
        .iter()
        .filter_map(|edge| {
            let from = *input.layout.get(&edge.source)?;
            let to = *input.layout.get(&edge.target)?;
            let congestion = input
                .conditions
                .get(&edge.road_id())
                .and_then(|c| c.current_congestion);
            Some(Primitive::Line {
                from,
                to,
                color: classify(congestion).color(),
                width: EDGE_WIDTH,
            })
        })
        .collect();
    Layer {
        kind: LayerKind::Edges,
        primitives,
    }
}

/// The vehicle's own path, or else the route the service suggested for it.
fn drawn_path<'a>(vehicle: &'a Vehicle, routes: &'a [SuggestedRoute]) -> Option<&'a Vec<NodeId>> {
    vehicle.current_path.as_ref().or_else(|| {
        routes
            .iter()
            .find(|r| r.vehicle_id.as_deref() == Some(vehicle.id.as_str()))
            .map(|r| &r.path)
    })
}

fn paths_layer(input: &SceneInput) -> Layer {
    let primitives = input
        .vehicles
        .iter()
        .filter(|v| v.is_on_route())
        .filter_map(|v| drawn_path(v, input.routes))
        .enumerate()
        .filter_map(|(index, path)| {
            let shift = (index % PATH_OFFSET_SLOTS) as f64 * PATH_OFFSET_STEP;
            let points: Vec<Point> = path
                .iter()
                .filter_map(|id| input.layout.get(id))
                .map(|p| Point::new(p.x + shift, p.y + shift))
                .collect();
            (points.len() >= 2).then(|| Primitive::Polyline {
                points,
                color: PATH_PALETTE[index % PATH_PALETTE.len()],
                width: PATH_WIDTH,
            })
        })
        .collect();
    Layer {
        kind: LayerKind::Paths,
        primitives,
    }
}

fn nodes_layer(input: &SceneInput) -> Layer {
    let cycles: HashMap<&str, u32> = input
        .traffic_lights
        .iter()
        .map(|light| (light.intersection_id.as_str(), light.cycle_seconds()))
        .collect();

    let mut primitives = Vec::with_capacity(input.nodes.len() * 2);
    for node in input.nodes {
        let Some(&center) = input.layout.get(&node.id) else {
            continue;
        };
        primitives.push(Primitive::Circle {
            center,
            radius: NODE_RADIUS,
            fill: NODE_FILL,
            stroke: Some(NODE_STROKE),
        });
        primitives.push(Primitive::Text {
            position: Point::new(center.x, center.y + NODE_RADIUS + LABEL_SIZE),
            text: node.name.clone(),
            size: LABEL_SIZE,
            color: LABEL_COLOR,
        });
        if let Some(&cycle) = cycles.get(node.id.as_str()).filter(|c| **c > 0) {
            primitives.push(Primitive::Text {
                position: Point::new(center.x, center.y - NODE_RADIUS - 4.0),
                text: format!("{}s", cycle),
                size: LABEL_SIZE - 2.0,
                color: LABEL_COLOR,
            });
        }
    }
    Layer {
        kind: LayerKind::Nodes,
        primitives,
    }
}

/// Arrow pointing along +x, drawn around the origin.
fn vehicle_marker(fill: Rgb) -> Primitive {
    Primitive::Polygon {
        points: vec![Point::new(9.0, 0.0), Point::new(-6.0, -5.0), Point::new(-6.0, 5.0)],
        fill,
    }
}

fn vehicles_layer(input: &SceneInput) -> Layer {
    let mut primitives = Vec::with_capacity(input.vehicles.len() * 2);
    for vehicle in input.vehicles {
        let Some(position) = vehicle_position(vehicle, input.layout, input.conditions) else {
            continue;
        };
        primitives.push(Primitive::Group {
            translate: Point::new(position.x, position.y),
            rotate_degrees: position.heading_degrees,
            children: vec![vehicle_marker(vehicle_color(vehicle.state))],
        });
        primitives.push(Primitive::Text {
            position: Point::new(position.x, position.y - 10.0),
            text: vehicle.id.clone(),
            size: LABEL_SIZE - 2.0,
            color: vehicle_color(vehicle.state),
        });
    }
    Layer {
        kind: LayerKind::Vehicles,
        primitives,
    }
}

/// Edges under paths under nodes under vehicles.
pub fn compose_scene(input: &SceneInput) -> Scene {
    Scene {
        width: input.width,
        height: input.height,
        layers: vec![
            edges_layer(input),
            paths_layer(input),
            nodes_layer(input),
            vehicles_layer(input),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_analyzer::CongestionLevel;
    use crate::shared_data::RoadCondition;

    struct Fixture {
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        vehicles: Vec<Vehicle>,
        routes: Vec<SuggestedRoute>,
        conditions: RoadConditions,
        lights: Vec<TrafficLight>,
        layout: Layout,
    }

    impl Fixture {
        fn new() -> Self {
            let nodes = vec![Node::new("A", "Alpha"), Node::new("B", "Beta"), Node::new("C", "Gamma")];
            let mut layout = Layout::new();
            layout.insert("A".into(), Point::new(0.0, 0.0));
            layout.insert("B".into(), Point::new(100.0, 0.0));
            layout.insert("C".into(), Point::new(100.0, 100.0));

            let mut conditions = RoadConditions::new();
            conditions.insert(
                "A-B".into(),
                RoadCondition {
                    current_congestion: Some(0.9),
                    current_travel_time: Some(10.0),
                    ..RoadCondition::default()
                },
            );

            let mut moving = Vehicle::parked("v1", "A");
            moving.state = VehicleState::OnRoute;
            moving.current_road_segment = Some(("A".into(), "B".into()));
            moving.time_on_current_segment = Some(5.0);
            moving.current_path = Some(vec!["A".into(), "B".into(), "C".into()]);

            Self {
                nodes,
                edges: vec![Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "Z")],
                vehicles: vec![moving, Vehicle::parked("v2", "C"), Vehicle::parked("ghost", "Z")],
                routes: Vec::new(),
                conditions,
                lights: vec![TrafficLight {
                    intersection_id: "B".into(),
                    green_times: [("A-B".to_string(), 30), ("C-B".to_string(), 20)].into_iter().collect(),
                }],
                layout,
            }
        }

        fn input(&self) -> SceneInput<'_> {
            SceneInput {
                nodes: &self.nodes,
                edges: &self.edges,
                vehicles: &self.vehicles,
                routes: &self.routes,
                conditions: &self.conditions,
                traffic_lights: &self.lights,
                layout: &self.layout,
                width: 200,
                height: 200,
            }
        }
    }

    #[test]
    fn layers_are_in_fixed_order() {
        let fixture = Fixture::new();
        let scene = compose_scene(&fixture.input());
        let kinds: Vec<LayerKind> = scene.layers.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![LayerKind::Edges, LayerKind::Paths, LayerKind::Nodes, LayerKind::Vehicles]
        );
    }

    #[test]
    fn edges_are_colored_by_congestion_and_gaps_omitted() {
        let fixture = Fixture::new();
        let scene = compose_scene(&fixture.input());
        let edges = &scene.layer(LayerKind::Edges).unwrap().primitives;

        // C-Z references an unknown node.
        assert_eq!(edges.len(), 2);
        let colors: Vec<Rgb> = edges
            .iter()
            .map(|p| match p {
                Primitive::Line { color, .. } => *color,
                other => panic!("unexpected primitive {:?}", other),
            })
            .collect();
        assert_eq!(colors, vec![CongestionLevel::Heavy.color(), CongestionLevel::Unknown.color()]);
    }

    #[test]
    fn vehicles_are_interpolated_and_unknown_ones_omitted() {
        let fixture = Fixture::new();
        let scene = compose_scene(&fixture.input());
        let groups: Vec<(Point, f64)> = scene
            .layer(LayerKind::Vehicles)
            .unwrap()
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Group {
                    translate,
                    rotate_degrees,
                    ..
                } => Some((*translate, *rotate_degrees)),
                _ => None,
            })
            .collect();

        assert_eq!(groups, vec![(Point::new(50.0, 0.0), 0.0), (Point::new(100.0, 100.0), 0.0)]);
    }

    #[test]
    fn path_follows_current_path() {
        let fixture = Fixture::new();
        let scene = compose_scene(&fixture.input());
        let paths = &scene.layer(LayerKind::Paths).unwrap().primitives;
        assert_eq!(paths.len(), 1);
        match &paths[0] {
            Primitive::Polyline { points, .. } => assert_eq!(
                points,
                &vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 100.0)]
            ),
            other => panic!("unexpected primitive {:?}", other),
        }
    }

    #[test]
    fn overlapping_paths_are_offset_by_index() {
        let mut fixture = Fixture::new();
        let twin = fixture.vehicles[0].clone();
        fixture.vehicles.push(twin);
        let scene = compose_scene(&fixture.input());
        let firsts: Vec<Point> = scene
            .layer(LayerKind::Paths)
            .unwrap()
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Polyline { points, .. } => points.first().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(firsts, vec![Point::new(0.0, 0.0), Point::new(PATH_OFFSET_STEP, PATH_OFFSET_STEP)]);
    }

    #[test]
    fn suggested_route_is_drawn_when_vehicle_has_no_path() {
        let mut fixture = Fixture::new();
        fixture.vehicles[0].current_path = None;
        fixture.routes = vec![
            SuggestedRoute {
                vehicle_id: Some("v2".into()),
                path: vec!["C".into(), "A".into()],
                estimated_travel_time: 12.0,
            },
            SuggestedRoute {
                vehicle_id: Some("v1".into()),
                path: vec!["A".into(), "C".into()],
                estimated_travel_time: 20.0,
            },
        ];
        let scene = compose_scene(&fixture.input());
        let paths = &scene.layer(LayerKind::Paths).unwrap().primitives;

        // v2 is parked, so only the route suggested for v1 is drawn.
        assert_eq!(paths.len(), 1);
        match &paths[0] {
            Primitive::Polyline { points, .. } => {
                assert_eq!(points, &vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)])
            }
            other => panic!("unexpected primitive {:?}", other),
        }
    }

    #[test]
    fn own_path_wins_over_suggested_route() {
        let mut fixture = Fixture::new();
        fixture.routes = vec![SuggestedRoute {
            vehicle_id: Some("v1".into()),
            path: vec!["A".into(), "C".into()],
            estimated_travel_time: 20.0,
        }];
        let scene = compose_scene(&fixture.input());
        match &scene.layer(LayerKind::Paths).unwrap().primitives[0] {
            Primitive::Polyline { points, .. } => assert_eq!(points.len(), 3),
            other => panic!("unexpected primitive {:?}", other),
        }
    }

    #[test]
    fn traffic_light_cycle_is_labelled() {
        let fixture = Fixture::new();
        let scene = compose_scene(&fixture.input());
        let texts: Vec<&str> = scene
            .layer(LayerKind::Nodes)
            .unwrap()
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Alpha", "Beta", "50s", "Gamma"]);
    }

    #[test]
    fn empty_state_composes_empty_layers() {
        let state = DashboardState::new();
        let layout = Layout::new();
        let scene = compose_scene(&SceneInput::from_state(&state, &layout, 100, 100));
        assert_eq!(scene.layers.len(), 4);
        assert!(scene.layers.iter().all(|l| l.primitives.is_empty()));
    }
}

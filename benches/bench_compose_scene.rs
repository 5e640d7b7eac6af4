use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use traffic_dashboard::geometry::{compute_layout, LayoutOptions};
use traffic_dashboard::map_presets::grid_preset;
use traffic_dashboard::rendering::{compose_scene, SceneInput};
use traffic_dashboard::shared_data::{
    RoadCondition, RoadConditions, TrafficLight, Vehicle, VehicleState,
};

fn bench_compose_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("Compose_Scene_Benchmarks");
    let mut rng = rand::rng();

    for &side in [4usize, 10, 20].iter() {
        let map = grid_preset(side, side, 100.0, 10.0);
        let layout = compute_layout(&map.nodes, 800.0, 600.0, &LayoutOptions::default());

        let conditions: RoadConditions = map
            .edges
            .iter()
            .map(|edge| {
                (
                    edge.road_id(),
                    RoadCondition {
                        current_congestion: Some(rng.random::<f64>()),
                        current_travel_time: Some(10.0),
                        ..RoadCondition::default()
                    },
                )
            })
            .collect();

        // One vehicle per road, each routed along it and its reverse.
        let vehicles: Vec<Vehicle> = map
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| {
                let mut v = Vehicle::parked(format!("veh_{}", i), edge.source.clone());
                v.state = VehicleState::OnRoute;
                v.current_road_segment = Some((edge.source.clone(), edge.target.clone()));
                v.time_on_current_segment = Some(rng.random_range(0.0..10.0));
                v.current_path = Some(vec![
                    edge.source.clone(),
                    edge.target.clone(),
                    edge.source.clone(),
                ]);
                v
            })
            .collect();

        let lights: Vec<TrafficLight> = map
            .nodes
            .iter()
            .step_by(3)
            .map(|n| TrafficLight {
                intersection_id: n.id.clone(),
                green_times: [(format!("{}-in", n.id), 30)].into_iter().collect(),
            })
            .collect();

        let input = SceneInput {
            nodes: &map.nodes,
            edges: &map.edges,
            vehicles: &vehicles,
            routes: &[],
            conditions: &conditions,
            traffic_lights: &lights,
            layout: &layout,
            width: 800,
            height: 600,
        };

        let roads = map.edges.len();
        group.bench_with_input(BenchmarkId::new("compose_scene", roads), &roads, |b, &_roads| {
            b.iter(|| {
                let scene = compose_scene(black_box(&input));
                black_box(scene);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compose_scene);
criterion_main!(benches);

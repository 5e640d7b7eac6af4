use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, watch};
use traffic_dashboard::communication::HttpSimulationClient;
use traffic_dashboard::config::DashboardConfig;
use traffic_dashboard::flow_analyzer::{congestion_alerts, summarize_conditions};
use traffic_dashboard::geometry::{LayoutCache, LayoutOptions};
use traffic_dashboard::map_presets::{default_map, load_preset};
use traffic_dashboard::monitoring::refresh_log::{
    build_report, log_refresh, read_refresh_log, RefreshRecord,
};
use traffic_dashboard::monitoring::{spawn_poller, DashboardState, PollerHandle};
use traffic_dashboard::rendering::{compose_scene, render_png, RenderOptions, SceneInput};
use traffic_dashboard::shared_data::{CityMap, RerouteRequest, RouteRequest, TrafficUpdate};

type StdinLines = Lines<BufReader<Stdin>>;

fn startup_map(config: &DashboardConfig) -> CityMap {
    match &config.map_preset_path {
        Some(path) => match load_preset(path) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("{}; using the default grid instead", e);
                default_map()
            }
        },
        None => default_map(),
    }
}

/// Appends every finished cycle to the refresh log.
async fn log_cycles(mut records: mpsc::UnboundedReceiver<RefreshRecord>, path: PathBuf) {
    while let Some(record) = records.recv().await {
        let path = path.clone();
        let written = tokio::task::spawn_blocking(move || log_refresh(&path, &record)).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Could not append to the refresh log: {}", e),
            Err(e) => log::warn!("Refresh log task failed: {}", e),
        }
    }
    log::debug!("Refresh log closed");
}

/// Renders a frame on every state change.
async fn render_frames(mut snapshots: watch::Receiver<Arc<DashboardState>>, config: DashboardConfig) {
    let mut layouts = LayoutCache::new(LayoutOptions::default());
    let options = RenderOptions::default();
    let (width, height) = (config.canvas_width, config.canvas_height);

    while snapshots.changed().await.is_ok() {
        let state = snapshots.borrow_and_update().clone();

        let Some(map) = &state.map else {
            layouts.clear();
            continue;
        };
        let layout = layouts.layout_for(map, width, height);
        let scene = compose_scene(&SceneInput::from_state(&state, layout, width, height));
        let frame_path = config.frame_path.clone();
        match tokio::task::spawn_blocking(move || render_png(&scene, &frame_path, &options)).await {
            Ok(Ok(())) => log::debug!("Frame written to {}", config.frame_path.display()),
            Ok(Err(e)) => log::warn!("{}", e),
            Err(e) => log::warn!("Frame render task failed: {}", e),
        }
    }
    log::debug!("Frame renderer finished");
}

async fn prompt(lines: &mut StdinLines, label: &str) -> Option<String> {
    print!("{}", label);
    let _ = std::io::stdout().flush();
    match lines.next_line().await {
        Ok(Some(line)) => Some(line.trim().to_string()),
        _ => None,
    }
}

fn show_status(state: &DashboardState) {
    println!("\nPhase: {:?}", state.phase);
    match state.simulation_time {
        Some(t) => println!("Simulation time: {:.1}s", t),
        None => println!("Simulation time: -"),
    }
    if let Some(map) = &state.map {
        println!("Map: {} nodes, {} roads", map.nodes.len(), map.edges.len());
    }
    println!("Vehicles: {}", state.vehicles.len());
    let summary = summarize_conditions(&state.road_conditions);
    println!(
        "Roads: {} light, {} moderate, {} heavy, {} unknown",
        summary.light, summary.moderate, summary.heavy, summary.unknown
    );
    for alert in congestion_alerts(&state.road_conditions) {
        println!("  ALERT: {}", alert.message);
    }
    if let Some(outcome) = &state.last_outcome {
        println!("Last refresh: {}", outcome.label());
    }
    if let Some(error) = &state.error {
        println!("Error: {}", error);
    }
}

async fn inspect_vehicle(lines: &mut StdinLines, client: &HttpSimulationClient) {
    let Some(id) = prompt(lines, "Vehicle ID: ").await else {
        return;
    };
    match client.vehicle(&id).await {
        Ok(vehicle) => {
            println!("\nVehicle {} ({:?})", vehicle.id, vehicle.state);
            println!("  At: {}  Destination: {}", vehicle.current_node_id, vehicle.destination_node_id);
            if let Some((source, target)) = &vehicle.current_road_segment {
                println!(
                    "  On road {}-{} for {:.1}s",
                    source,
                    target,
                    vehicle.time_on_current_segment.unwrap_or(0.0)
                );
            }
            if let Some(path) = &vehicle.current_path {
                println!("  Path: {}", path.join(" -> "));
            }
            if let Some(cost) = vehicle.path_cost {
                println!("  Path cost: {:.1}s", cost);
            }
        }
        Err(e) => eprintln!("Error fetching vehicle: {}", e),
    }
}

async fn show_traffic_lights(client: &HttpSimulationClient) {
    match client.traffic_lights().await {
        Ok(lights) if lights.is_empty() => println!("No traffic lights reported."),
        Ok(lights) => {
            for light in lights {
                let mut phases: Vec<String> = light
                    .green_times
                    .iter()
                    .map(|(road, secs)| format!("{}={}s", road, secs))
                    .collect();
                phases.sort();
                println!(
                    "{} (cycle {}s): {}",
                    light.intersection_id,
                    light.cycle_seconds(),
                    phases.join(", ")
                );
            }
        }
        Err(e) => eprintln!("Error fetching traffic lights: {}", e),
    }
}

async fn add_vehicle(lines: &mut StdinLines, client: &HttpSimulationClient) -> bool {
    let Some(start) = prompt(lines, "Start node: ").await else {
        return false;
    };
    let Some(end) = prompt(lines, "Destination node: ").await else {
        return false;
    };
    let Some(id) = prompt(lines, "Vehicle ID (blank for automatic): ").await else {
        return false;
    };
    let request = RouteRequest {
        start_node_id: start,
        end_node_id: end,
        vehicle_id: (!id.is_empty()).then_some(id),
    };
    match client.add_vehicle(&request).await {
        Ok(vehicle) => {
            println!("Added vehicle {} ({:?})", vehicle.id, vehicle.state);
            true
        }
        Err(e) => {
            eprintln!("Error adding vehicle: {}", e);
            false
        }
    }
}

async fn reroute_vehicle(lines: &mut StdinLines, client: &HttpSimulationClient) -> bool {
    let Some(id) = prompt(lines, "Vehicle ID: ").await else {
        return false;
    };
    let Some(start) = prompt(lines, "New start node (blank to keep current): ").await else {
        return false;
    };
    let request = RerouteRequest {
        new_start_node_id: (!start.is_empty()).then_some(start),
    };
    match client.reroute_vehicle(&id, &request).await {
        Ok(vehicle) => {
            let path = vehicle.current_path.unwrap_or_default();
            println!("Vehicle {} rerouted via {}", vehicle.id, path.join(" -> "));
            true
        }
        Err(e) => {
            eprintln!("Error rerouting vehicle: {}", e);
            false
        }
    }
}

async fn set_congestion(lines: &mut StdinLines, client: &HttpSimulationClient) -> bool {
    let Some(road_id) = prompt(lines, "Road ID (e.g. A1-A2): ").await else {
        return false;
    };
    let Some(level) = prompt(lines, "Congestion level (0.0 - 1.0): ").await else {
        return false;
    };
    let congestion_level = match level.parse::<f64>() {
        Ok(l) if (0.0..=1.0).contains(&l) => l,
        _ => {
            println!("Congestion level must be a number between 0 and 1.");
            return false;
        }
    };
    let updates = [TrafficUpdate {
        road_id,
        congestion_level,
    }];
    match client.update_traffic(&updates).await {
        Ok(_) => {
            println!("Congestion set on {}", updates[0].road_id);
            true
        }
        Err(e) => {
            eprintln!("Error updating traffic: {}", e);
            false
        }
    }
}

fn show_refresh_report(config: &DashboardConfig) {
    let Some(path) = &config.refresh_log_path else {
        println!("Refresh logging is disabled.");
        return;
    };
    match read_refresh_log(path) {
        Ok(records) => {
            let report = build_report(&records);
            println!(
                "\n{} cycles: {} complete, {} partial, {} failed",
                report.cycles, report.complete, report.partial, report.failed
            );
            for record in records.iter().rev().take(5) {
                println!(
                    "  #{} {} vehicles={} heavy_roads={}{}",
                    record.cycle,
                    record.outcome,
                    record.vehicles,
                    record.heavy_roads,
                    record
                        .error
                        .as_deref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                );
            }
        }
        Err(e) => eprintln!("Error reading refresh log: {}", e),
    }
}

async fn run_cli(poller: &PollerHandle, client: &HttpSimulationClient, config: &DashboardConfig) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("\nTraffic Dashboard Admin CLI");
        println!("1. Show Status");
        println!("2. Inspect Vehicle");
        println!("3. Show Traffic Lights");
        println!("4. Add Vehicle");
        println!("5. Reroute Vehicle");
        println!("6. Set Road Congestion");
        println!("7. Reload Map");
        println!("8. Show Refresh Report");
        println!("9. Dump State as JSON");
        println!("10. Exit");
        let Some(choice) = prompt(&mut lines, "Enter your choice: ").await else {
            break;
        };
        let mutated = match choice.parse::<u32>().unwrap_or(0) {
            1 => {
                show_status(&poller.snapshot());
                false
            }
            2 => {
                inspect_vehicle(&mut lines, client).await;
                false
            }
            3 => {
                show_traffic_lights(client).await;
                false
            }
            4 => add_vehicle(&mut lines, client).await,
            5 => reroute_vehicle(&mut lines, client).await,
            6 => set_congestion(&mut lines, client).await,
            7 => {
                let path = prompt(&mut lines, "Preset file (blank for default grid): ")
                    .await
                    .unwrap_or_default();
                let map = if path.is_empty() {
                    Ok(default_map())
                } else {
                    load_preset(Path::new(&path))
                };
                match map {
                    Ok(map) => {
                        poller.load_map(map);
                        println!("Map submitted.");
                    }
                    Err(e) => eprintln!("Error loading preset: {}", e),
                }
                false
            }
            8 => {
                show_refresh_report(config);
                false
            }
            9 => {
                match serde_json::to_string_pretty(&*poller.snapshot()) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Error serializing state: {}", e),
                }
                false
            }
            10 => {
                println!("Exiting CLI.");
                break;
            }
            _ => {
                println!("Invalid choice. Try again.");
                false
            }
        };
        if mutated {
            poller.request_refresh();
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    let client = match HttpSimulationClient::new(config.api_url.clone(), config.request_timeout) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Could not build HTTP client: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Connecting to simulation service at {}", client.base_url());

    let poller = spawn_poller(
        Arc::clone(&client),
        config.poller_config(),
        Some(startup_map(&config)),
    );
    let frames = tokio::spawn(render_frames(poller.subscribe(), config.clone()));
    let cycle_log = config
        .refresh_log_path
        .clone()
        .map(|path| tokio::spawn(log_cycles(poller.refresh_records(), path)));

    run_cli(&poller, &client, &config).await;

    poller.stop().await;
    if let Err(e) = frames.await {
        log::warn!("Frame renderer ended abnormally: {}", e);
    }
    if let Some(cycle_log) = cycle_log {
        if let Err(e) = cycle_log.await {
            log::warn!("Refresh logger ended abnormally: {}", e);
        }
    }
}

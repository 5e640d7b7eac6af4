// Simulation service
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

// Endpoint paths
pub const PATH_LOAD_MAP: &str = "/map/load";
pub const PATH_SYSTEM_STATE: &str = "/system/state";
pub const PATH_ROAD_CONDITIONS: &str = "/map/roads/conditions";
pub const PATH_VEHICLES: &str = "/vehicles";
pub const PATH_TRAFFIC_UPDATE: &str = "/traffic/update";
pub const PATH_TRAFFIC_LIGHTS: &str = "/traffic-lights";

// Polling cadence (milliseconds)
pub const POLL_INTERVAL_MS: u64 = 2_000;
pub const INITIAL_REFRESH_DELAY_MS: u64 = 500;
pub const REQUEST_TIMEOUT_MS: u64 = 5_000;

// Canvas
pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 600;
pub const NODE_RADIUS: f64 = 12.0;
pub const LAYOUT_PADDING: f64 = NODE_RADIUS * 2.0;
pub const CIRCLE_RADIUS_FACTOR: f64 = 0.38;

// Output files
pub const FRAME_PATH: &str = "traffic_frame.png";
pub const REFRESH_LOG_PATH: &str = "refresh_log.csv";

use crate::error::{DashboardError, Result};
use crate::global_variables::{
    CANVAS_HEIGHT, CANVAS_WIDTH, DEFAULT_API_URL, FRAME_PATH, INITIAL_REFRESH_DELAY_MS,
    POLL_INTERVAL_MS, REFRESH_LOG_PATH, REQUEST_TIMEOUT_MS,
};
use crate::monitoring::state_poller::PollerConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings for the dashboard binary.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub initial_refresh_delay: Duration,
    pub request_timeout: Duration,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Fetch `/vehicles` separately instead of relying on the system state.
    pub fetch_vehicle_list: bool,
    pub frame_path: PathBuf,
    pub refresh_log_path: Option<PathBuf>,
    pub map_preset_path: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            initial_refresh_delay: Duration::from_millis(INITIAL_REFRESH_DELAY_MS),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            fetch_vehicle_list: false,
            frame_path: PathBuf::from(FRAME_PATH),
            refresh_log_path: Some(PathBuf::from(REFRESH_LOG_PATH)),
            map_preset_path: None,
        }
    }
}

impl DashboardConfig {
    /// Defaults overridden by `TRAFFIC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("TRAFFIC_API_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                return Err(DashboardError::Config("TRAFFIC_API_URL is empty".into()));
            }
            config.api_url = url;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TRAFFIC_POLL_INTERVAL_MS")? {
            if ms == 0 {
                return Err(DashboardError::Config(
                    "TRAFFIC_POLL_INTERVAL_MS must be positive".into(),
                ));
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TRAFFIC_INITIAL_REFRESH_MS")? {
            config.initial_refresh_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TRAFFIC_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(width) = parse_var::<u32>(&lookup, "TRAFFIC_CANVAS_WIDTH")? {
            config.canvas_width = width;
        }
        if let Some(height) = parse_var::<u32>(&lookup, "TRAFFIC_CANVAS_HEIGHT")? {
            config.canvas_height = height;
        }
        if config.canvas_width == 0 || config.canvas_height == 0 {
            return Err(DashboardError::Config("canvas size must be non-zero".into()));
        }
        if let Some(flag) = parse_var::<bool>(&lookup, "TRAFFIC_FETCH_VEHICLE_LIST")? {
            config.fetch_vehicle_list = flag;
        }
        if let Some(path) = lookup("TRAFFIC_FRAME_PATH") {
            config.frame_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("TRAFFIC_REFRESH_LOG") {
            // An empty value turns the refresh log off.
            config.refresh_log_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(path) = lookup("TRAFFIC_MAP_PRESET") {
            config.map_preset_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: self.poll_interval,
            initial_refresh_delay: self.initial_refresh_delay,
            // Leave room for every request of a cycle to hit its own timeout first.
            cycle_timeout: self.request_timeout * 2,
            fetch_vehicle_list: self.fetch_vehicle_list,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DashboardError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}

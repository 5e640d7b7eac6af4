use crate::error::Result;
use crate::flow_analyzer::summarize_conditions;
use crate::monitoring::dashboard_state::DashboardState;
use crate::shared_data::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// One row of the refresh history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub timestamp: u64,
    pub cycle: u64,
    pub outcome: String,
    pub simulation_time: Option<f64>,
    pub vehicles: usize,
    pub roads: usize,
    pub heavy_roads: usize,
    pub error: Option<String>,
}

impl RefreshRecord {
    /// Summarises the last settled cycle of `state`.
    pub fn from_state(state: &DashboardState) -> Self {
        Self {
            timestamp: current_timestamp(),
            cycle: state.cycles_started,
            outcome: state
                .last_outcome
                .as_ref()
                .map(|o| o.label().to_string())
                .unwrap_or_else(|| "none".to_string()),
            simulation_time: state.simulation_time,
            vehicles: state.vehicles.len(),
            roads: state.road_conditions.len(),
            heavy_roads: summarize_conditions(&state.road_conditions).heavy,
            error: state.error.clone(),
        }
    }
}

/// Appends a record, writing the header row when the file is new.
pub fn log_refresh(path: &Path, record: &RefreshRecord) -> Result<()> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

pub fn read_refresh_log(path: &Path) -> Result<Vec<RefreshRecord>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Outcome counts over a refresh history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub cycles: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
}

pub fn build_report(records: &[RefreshRecord]) -> RefreshReport {
    let mut report = RefreshReport {
        cycles: records.len(),
        ..RefreshReport::default()
    };
    for record in records {
        match record.outcome.as_str() {
            "complete" => report.complete += 1,
            "partial" => report.partial += 1,
            _ => report.failed += 1,
        }
    }
    report
}

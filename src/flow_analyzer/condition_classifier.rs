// condition_classifier.rs

use crate::rendering::scene::Rgb;
use crate::shared_data::RoadConditions;
use serde::{Deserialize, Serialize};

/// Congestion above this is heavy.
pub const HEAVY_THRESHOLD: f64 = 0.75;
/// Congestion above this (and up to the heavy threshold) is moderate.
pub const MODERATE_THRESHOLD: f64 = 0.4;

/// Severity tier of a road's congestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CongestionLevel {
    Light,
    Moderate,
    Heavy,
    Unknown,
}

impl CongestionLevel {
    pub fn color(self) -> Rgb {
        match self {
            CongestionLevel::Light => Rgb(46, 160, 67),
            CongestionLevel::Moderate => Rgb(240, 160, 20),
            CongestionLevel::Heavy => Rgb(214, 39, 40),
            CongestionLevel::Unknown => Rgb(150, 150, 150),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CongestionLevel::Light => "light",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Unknown => "unknown",
        }
    }
}

/// Classifies a congestion value. Total: missing, NaN or negative input is `Unknown`.
pub fn classify(congestion: Option<f64>) -> CongestionLevel {
    match congestion {
        None => CongestionLevel::Unknown,
        Some(c) if c.is_nan() || c < 0.0 => CongestionLevel::Unknown,
        Some(c) if c > HEAVY_THRESHOLD => CongestionLevel::Heavy,
        Some(c) if c > MODERATE_THRESHOLD => CongestionLevel::Moderate,
        Some(_) => CongestionLevel::Light,
    }
}

/// Road counts per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionSummary {
    pub light: usize,
    pub moderate: usize,
    pub heavy: usize,
    pub unknown: usize,
}

impl CongestionSummary {
    pub fn total(&self) -> usize {
        self.light + self.moderate + self.heavy + self.unknown
    }
}

pub fn summarize_conditions(conditions: &RoadConditions) -> CongestionSummary {
    let mut summary = CongestionSummary::default();
    for condition in conditions.values() {
        match classify(condition.current_congestion) {
            CongestionLevel::Light => summary.light += 1,
            CongestionLevel::Moderate => summary.moderate += 1,
            CongestionLevel::Heavy => summary.heavy += 1,
            CongestionLevel::Unknown => summary.unknown += 1,
        }
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionAlert {
    pub road_id: String,
    pub congestion: f64,
    pub message: String,
}

/// Heavy roads, most congested first.
pub fn congestion_alerts(conditions: &RoadConditions) -> Vec<CongestionAlert> {
    let mut alerts: Vec<CongestionAlert> = conditions
        .iter()
        .filter_map(|(road, condition)| {
            let congestion = condition.current_congestion?;
            (classify(Some(congestion)) == CongestionLevel::Heavy).then(|| CongestionAlert {
                road_id: road.clone(),
                congestion,
                message: format!(
                    "Road '{}' is heavily congested ({:.2}, {} vehicles)",
                    road, congestion, condition.current_vehicles
                ),
            })
        })
        .collect();
    alerts.sort_by(|a, b| {
        b.congestion
            .total_cmp(&a.congestion)
            .then_with(|| a.road_id.cmp(&b.road_id))
    });
    alerts
}

// flow_analyzer/mod.rs
pub mod condition_classifier;

pub use condition_classifier::{
    classify, congestion_alerts, summarize_conditions, CongestionAlert, CongestionLevel,
    CongestionSummary,
};

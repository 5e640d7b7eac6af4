pub mod communication;
pub mod config;
pub mod error;
pub mod flow_analyzer;
pub mod geometry;
pub mod global_variables;
pub mod map_presets;
pub mod monitoring;
pub mod rendering;
pub mod shared_data;

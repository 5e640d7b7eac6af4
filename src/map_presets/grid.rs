use crate::error::{DashboardError, Result};
use crate::shared_data::{CityMap, Edge, Node};
use std::path::Path;

pub const DEFAULT_GRID_SIZE: usize = 4;
pub const DEFAULT_SPACING: f64 = 100.0;
pub const DEFAULT_BASE_TRAVEL_TIME: f64 = 10.0;

/// Row letter followed by a 1-based column, e.g. `B3`.
fn grid_node_id(row: usize, col: usize) -> String {
    let letter = (b'A' + (row % 26) as u8) as char;
    if row < 26 {
        format!("{}{}", letter, col + 1)
    } else {
        format!("{}{}_{}", letter, row / 26, col + 1)
    }
}

/// A `rows` x `cols` grid with two-way roads between horizontal and vertical neighbours.
pub fn grid_preset(rows: usize, cols: usize, spacing: f64, base_travel_time: f64) -> CityMap {
    let mut nodes = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let id = grid_node_id(row, col);
            nodes.push(
                Node::new(id.clone(), format!("Intersection {}", id))
                    .at(col as f64 * spacing, row as f64 * spacing),
            );
        }
    }

    let mut edges = Vec::new();
    let mut two_way = |a: String, b: String| {
        let mut forward = Edge::new(a.clone(), b.clone());
        forward.base_travel_time = base_travel_time;
        let mut backward = Edge::new(b, a);
        backward.base_travel_time = base_travel_time;
        edges.push(forward);
        edges.push(backward);
    };

    // Horizontal roads
    for row in 0..rows {
        for col in 0..cols.saturating_sub(1) {
            two_way(grid_node_id(row, col), grid_node_id(row, col + 1));
        }
    }
    // Vertical roads
    for col in 0..cols {
        for row in 0..rows.saturating_sub(1) {
            two_way(grid_node_id(row, col), grid_node_id(row + 1, col));
        }
    }

    CityMap { nodes, edges }
}

/// The map submitted at startup when no preset file is configured.
pub fn default_map() -> CityMap {
    grid_preset(
        DEFAULT_GRID_SIZE,
        DEFAULT_GRID_SIZE,
        DEFAULT_SPACING,
        DEFAULT_BASE_TRAVEL_TIME,
    )
}

/// Reads a JSON preset in the load-map format.
pub fn load_preset(path: &Path) -> Result<CityMap> {
    let text = std::fs::read_to_string(path)?;
    let map: CityMap = serde_json::from_str(&text)?;
    if map.nodes.is_empty() {
        return Err(DashboardError::MapLoad(format!(
            "preset {} has no nodes",
            path.display()
        )));
    }
    Ok(map)
}

pub mod grid;

pub use grid::{default_map, grid_preset, load_preset};

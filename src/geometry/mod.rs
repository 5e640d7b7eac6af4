pub mod interpolation;
pub mod layout;

pub use interpolation::{vehicle_position, VehiclePosition};
pub use layout::{compute_layout, LayoutCache, LayoutOptions};

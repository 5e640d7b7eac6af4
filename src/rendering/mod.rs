pub mod plotters_renderer;
pub mod scene;

pub use plotters_renderer::{draw_scene, render_png, render_svg, RenderOptions};
pub use scene::{compose_scene, Layer, LayerKind, Primitive, Rgb, Scene, SceneInput};

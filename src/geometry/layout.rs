// layout.rs
//
// Converts the nodes of a loaded map into canvas positions. Nodes that carry
// absolute coordinates are min-max normalised into the padded canvas; nodes
// without coordinates are spread evenly on a circle around the canvas centre.
// Each node picks its rule independently, so a map mixing both kinds gets a
// mix of both placements.

use crate::global_variables::{CIRCLE_RADIUS_FACTOR, LAYOUT_PADDING};
use crate::shared_data::{CityMap, Layout, Node, Point};
use std::f64::consts::PI;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Inset from every canvas edge for coordinate-based placement.
    pub padding: f64,
    /// Circle radius as a fraction of `min(width, height)`.
    pub circle_radius_factor: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            padding: LAYOUT_PADDING,
            circle_radius_factor: CIRCLE_RADIUS_FACTOR,
        }
    }
}

/// Bounding box of the nodes that carry coordinates.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn of(nodes: &[Node]) -> Option<Self> {
        nodes
            .iter()
            .filter_map(Node::coordinates)
            .fold(None, |acc: Option<Bounds>, (x, y)| {
                Some(match acc {
                    None => Bounds {
                        min_x: x,
                        max_x: x,
                        min_y: y,
                        max_y: y,
                    },
                    Some(b) => Bounds {
                        min_x: b.min_x.min(x),
                        max_x: b.max_x.max(x),
                        min_y: b.min_y.min(y),
                        max_y: b.max_y.max(y),
                    },
                })
            })
    }
}

/// Maps `value` from `[min, max]` onto `[padding, extent - padding]`.
fn normalize(value: f64, min: f64, max: f64, extent: f64, padding: f64) -> f64 {
    let range = max - min;
    let range = if range == 0.0 { 1.0 } else { range };
    (value - min) / range * (extent - 2.0 * padding) + padding
}

/// Position of node `index` out of `count` on the fallback circle.
pub fn circular_position(index: usize, count: usize, width: f64, height: f64, options: &LayoutOptions) -> Point {
    let radius = options.circle_radius_factor * width.min(height);
    let angle = index as f64 / count.max(1) as f64 * 2.0 * PI - PI / 2.0;
    Point::new(
        width / 2.0 + radius * angle.cos(),
        height / 2.0 + radius * angle.sin(),
    )
}

/// Lays out every node onto a `width` x `height` canvas.
pub fn compute_layout(nodes: &[Node], width: f64, height: f64, options: &LayoutOptions) -> Layout {
    let bounds = Bounds::of(nodes);
    let count = nodes.len();

    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let position = match (node.coordinates(), bounds) {
                (Some((x, y)), Some(b)) => Point::new(
                    normalize(x, b.min_x, b.max_x, width, options.padding),
                    normalize(y, b.min_y, b.max_y, height, options.padding),
                ),
                _ => circular_position(index, count, width, height, options),
            };
            (node.id.clone(), position)
        })
        .collect()
}

/// Keeps the last layout and recomputes only when the map or canvas changes.
#[derive(Debug, Default)]
pub struct LayoutCache {
    options: LayoutOptions,
    map: Option<Arc<CityMap>>,
    size: (u32, u32),
    layout: Layout,
    recomputations: u64,
}

impl LayoutCache {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn layout_for(&mut self, map: &Arc<CityMap>, width: u32, height: u32) -> &Layout {
        let same_map = self
            .map
            .as_ref()
            .map(|cached| Arc::ptr_eq(cached, map))
            .unwrap_or(false);
        if !same_map || self.size != (width, height) {
            self.layout = compute_layout(&map.nodes, width as f64, height as f64, &self.options);
            self.map = Some(Arc::clone(map));
            self.size = (width, height);
            self.recomputations += 1;
        }
        &self.layout
    }

    /// Forgets the cached map, e.g. after the map is cleared.
    pub fn clear(&mut self) {
        self.map = None;
        self.layout.clear();
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

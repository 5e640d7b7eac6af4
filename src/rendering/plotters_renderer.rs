use crate::error::{DashboardError, Result};
use crate::rendering::scene::{Primitive, Rgb, Scene};
use crate::shared_data::Point;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Draw node names, cycle times and vehicle ids.
    pub labels: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { labels: true }
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Render(e.to_string())
}

fn color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.0, rgb.1, rgb.2)
}

/// Rotation followed by translation, accumulated through nested groups.
#[derive(Debug, Clone, Copy)]
struct Transform {
    dx: f64,
    dy: f64,
    cos: f64,
    sin: f64,
}

impl Transform {
    const IDENTITY: Transform = Transform {
        dx: 0.0,
        dy: 0.0,
        cos: 1.0,
        sin: 0.0,
    };

    fn apply(&self, p: Point) -> (i32, i32) {
        let x = p.x * self.cos - p.y * self.sin + self.dx;
        let y = p.x * self.sin + p.y * self.cos + self.dy;
        (x.round() as i32, y.round() as i32)
    }

    fn then_group(&self, translate: Point, rotate_degrees: f64) -> Transform {
        let (sin, cos) = rotate_degrees.to_radians().sin_cos();
        let (dx, dy) = (
            translate.x * self.cos - translate.y * self.sin + self.dx,
            translate.x * self.sin + translate.y * self.cos + self.dy,
        );
        Transform {
            dx,
            dy,
            cos: self.cos * cos - self.sin * sin,
            sin: self.sin * cos + self.cos * sin,
        }
    }
}

fn draw_primitive<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    primitive: &Primitive,
    transform: &Transform,
    options: &RenderOptions,
) -> Result<()> {
    match primitive {
        Primitive::Line {
            from,
            to,
            color: rgb,
            width,
        } => {
            let style = color(*rgb).stroke_width(width.round().max(1.0) as u32);
            root.draw(&PathElement::new(
                vec![transform.apply(*from), transform.apply(*to)],
                style,
            ))
            .map_err(render_err)?;
        }
        Primitive::Polyline {
            points,
            color: rgb,
            width,
        } => {
            let style = color(*rgb).stroke_width(width.round().max(1.0) as u32);
            let points: Vec<(i32, i32)> = points.iter().map(|p| transform.apply(*p)).collect();
            root.draw(&PathElement::new(points, style)).map_err(render_err)?;
        }
        Primitive::Circle {
            center,
            radius,
            fill,
            stroke,
        } => {
            let center = transform.apply(*center);
            let radius = radius.round().max(1.0) as i32;
            root.draw(&Circle::new(center, radius, color(*fill).filled()))
                .map_err(render_err)?;
            if let Some(stroke) = stroke {
                root.draw(&Circle::new(center, radius, color(*stroke).stroke_width(2)))
                    .map_err(render_err)?;
            }
        }
        Primitive::Polygon { points, fill } => {
            let points: Vec<(i32, i32)> = points.iter().map(|p| transform.apply(*p)).collect();
            root.draw(&Polygon::new(points, color(*fill).filled()))
                .map_err(render_err)?;
        }
        Primitive::Group {
            translate,
            rotate_degrees,
            children,
        } => {
            let inner = transform.then_group(*translate, *rotate_degrees);
            for child in children {
                draw_primitive(root, child, &inner, options)?;
            }
        }
        Primitive::Text {
            position,
            text,
            size,
            color: rgb,
        } => {
            if !options.labels {
                return Ok(());
            }
            let rgb = color(*rgb);
            let style = TextStyle::from(("sans-serif", *size).into_font())
                .color(&rgb)
                .pos(Pos::new(HPos::Center, VPos::Center));
            // A host without a usable font loses its labels, not the frame.
            if let Err(e) = root.draw(&Text::new(text.clone(), transform.apply(*position), style)) {
                log::debug!("Label '{}' not drawn: {}", text, e);
            }
        }
    }
    Ok(())
}

/// Draws every layer of `scene` onto `root`, bottom layer first.
pub fn draw_scene<DB: DrawingBackend>(
    scene: &Scene,
    root: &DrawingArea<DB, Shift>,
    options: &RenderOptions,
) -> Result<()> {
    root.fill(&WHITE).map_err(render_err)?;
    for layer in &scene.layers {
        for primitive in &layer.primitives {
            draw_primitive(root, primitive, &Transform::IDENTITY, options)?;
        }
    }
    Ok(())
}

/// Renders the frame to a PNG file.
pub fn render_png(scene: &Scene, path: &Path, options: &RenderOptions) -> Result<()> {
    let root = BitMapBackend::new(path, (scene.width, scene.height)).into_drawing_area();
    draw_scene(scene, &root, options)?;
    root.present().map_err(render_err)?;
    Ok(())
}

/// Renders the frame to an SVG document.
pub fn render_svg(scene: &Scene, options: &RenderOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (scene.width, scene.height)).into_drawing_area();
        draw_scene(scene, &root, options)?;
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

//! Container border decoration.
//!
//! A border is four scene buffers forming a rectangular frame around the
//! container rectangle, painted with a gradient pattern. Pixel rendering is
//! the renderer's job; here we keep the frame geometry and the resolved
//! gradient coordinates it needs.
//!
//! Buffer order is clockwise from the top: top, right, bottom, left. The top
//! and bottom strips span the full width, the side strips fill the hole
//! between them.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::container::ContainerId;
use crate::scene::{NodeId, Scene, SceneOwner};

pub type Color = [f32; 4];

/// Gradient stop: offset in `[0, 1]` plus RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub offset: f64,
    pub color: Color,
}

/// Border fill. Gradients are resized with the frame, so the reference
/// pattern keeps only its stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Solid(Color),
    Linear { stops: Vec<ColorStop> },
    Radial { stops: Vec<ColorStop> },
}

impl Pattern {
    pub fn solid(color: Color) -> Self {
        Pattern::Solid(color)
    }
}

/// Gradient coordinates resolved against one border rectangle.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternGeometry {
    Solid,
    Linear { start: (f64, f64), end: (f64, f64) },
    Radial { center: (f64, f64), radius: f64 },
}

/// Start coordinate of the linear gradient on a square of the given radius.
/// Zero degrees is at the left side, rotating clockwise.
fn find_start_coord(degree_rot: i32, radius: f64) -> (f64, f64) {
    // adjust so that it start from the left
    let degree_rot = (degree_rot + 360 - 45).rem_euclid(360);
    let full_width = radius * 2.0;

    let mod45deg = degree_rot % 45;
    let diff = (mod45deg as f64 * PI / 180.0).tan() * radius;

    let mut x = 0.0;
    let mut y = 0.0;
    if degree_rot < 90 {
        x = diff;
        if degree_rot >= 45 {
            x += radius;
        }
    } else if degree_rot < 180 {
        x = full_width;
        y = diff;
        if degree_rot >= 135 {
            y += radius;
        }
    } else if degree_rot < 270 {
        y = full_width;
        x = full_width - diff;
        if degree_rot >= 225 {
            x -= radius;
        }
    } else {
        y = full_width;
        y -= diff;
        if degree_rot >= 315 {
            y -= radius;
        }
    }

    (x, y)
}

/// Resolve a pattern against the full frame rectangle.
///
/// The end point of a linear gradient is the reflection of the start point
/// through the center of the square spanned by the short side.
fn process_pattern(pattern: &Pattern, full_w: i32, full_h: i32, rotation: i32) -> PatternGeometry {
    let max_width = full_w.max(full_h) as f64;
    let min_width = full_w.min(full_h) as f64;
    match pattern {
        Pattern::Solid(_) => PatternGeometry::Solid,
        Pattern::Linear { .. } => {
            let start = find_start_coord(rotation, min_width / 2.0);
            let end = (min_width - start.0, min_width - start.1);
            PatternGeometry::Linear { start, end }
        }
        Pattern::Radial { .. } => PatternGeometry::Radial {
            center: (full_w as f64 / 2.0, full_h as f64 / 2.0),
            radius: max_width,
        },
    }
}

#[derive(Debug)]
pub struct BorderBuffer {
    pub node: NodeId,
    pub width: i32,
    pub height: i32,
    /// Offset of this strip inside the frame, for mapping the gradient.
    pub side_offset: (i32, i32),
    pub geometry: PatternGeometry,
}

#[derive(Debug)]
pub struct Border {
    pub thickness: i32,
    pub width: i32,
    pub height: i32,
    pub pattern: Pattern,
    pub rotation: i32,
    pub enabled: bool,
    attached_tree: Option<NodeId>,
    /// Clockwise top to left. `None` when allocation was skipped; the
    /// container stays usable without its decoration.
    buffers: Option<[BorderBuffer; 4]>,
}

impl Border {
    pub fn new(pattern: Pattern, rect_w: i32, rect_h: i32, thickness: i32, rotation: i32) -> Self {
        Self {
            thickness,
            width: rect_w,
            height: rect_h,
            pattern,
            rotation,
            enabled: true,
            attached_tree: None,
            buffers: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.buffers.is_some()
    }

    /// Effective thickness: a disabled border occupies no space.
    pub fn thickness(&self) -> i32 {
        if !self.enabled {
            return 0;
        }
        self.thickness
    }

    /// Frame strip rectangles for the current size: (w, h, x, y) clockwise
    /// top to left.
    fn strip_rects(&self) -> [(i32, i32, i32, i32); 4] {
        let (w, h, bw) = (self.width, self.height, self.thickness);
        [
            (w, bw, 0, 0),
            (bw, h - bw * 2, w - bw, bw),
            (w, bw, 0, h - bw),
            (bw, h - bw * 2, 0, bw),
        ]
    }

    fn build_buffers(&mut self, scene: &mut Scene, tree: NodeId, container: ContainerId) {
        let rects = self.strip_rects();
        let buffers = rects.map(|(w, h, x, y)| {
            let node = scene.create_buffer(tree, w, h, SceneOwner::Border(container));
            scene.lower_to_bottom(node);
            scene.set_position(node, x, y);
            BorderBuffer {
                node,
                width: w,
                height: h,
                side_offset: (x, y),
                geometry: process_pattern(&self.pattern, self.width, self.height, self.rotation),
            }
        });
        self.buffers = Some(buffers);
        self.set_enabled(scene, self.enabled);
    }

    pub fn attach_to_scene(&mut self, scene: &mut Scene, tree: NodeId, container: ContainerId) {
        if self.thickness == 0 {
            return;
        }
        self.attached_tree = Some(tree);
        if self.buffers.is_none() {
            self.build_buffers(scene, tree, container);
        }
    }

    pub fn set_enabled(&mut self, scene: &mut Scene, enabled: bool) {
        self.enabled = enabled;
        if let Some(buffers) = &self.buffers {
            for buffer in buffers {
                scene.set_enabled(buffer.node, enabled);
            }
        }
    }

    pub fn set_pattern(&mut self, scene: &mut Scene, pattern: Pattern, container: ContainerId) {
        if pattern == self.pattern {
            return;
        }
        self.pattern = pattern;
        self.redraw(scene, container);
    }

    /// Noop if the frame dimensions are unchanged.
    pub fn resize(&mut self, scene: &mut Scene, rect_w: i32, rect_h: i32, container: ContainerId) {
        if !self.is_valid() {
            return;
        }
        if self.width == rect_w && self.height == rect_h {
            return;
        }
        self.width = rect_w;
        self.height = rect_h;
        self.redraw(scene, container);
    }

    fn redraw(&mut self, scene: &mut Scene, container: ContainerId) {
        let Some(tree) = self.attached_tree else {
            return;
        };
        if let Some(buffers) = self.buffers.take() {
            for buffer in buffers {
                scene.destroy(buffer.node);
            }
        }
        self.build_buffers(scene, tree, container);
    }

    pub fn destroy(&mut self, scene: &mut Scene) {
        if let Some(buffers) = self.buffers.take() {
            for buffer in buffers {
                scene.destroy(buffer.node);
            }
        }
        self.attached_tree = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_coord_cardinal_points() {
        // 0 degrees starts at the left edge midpoint
        let (x, y) = find_start_coord(0, 50.0);
        assert!(x.abs() < 1e-6 && (y - 50.0).abs() < 1.0, "got ({x}, {y})");
        // 90 degrees starts at the top edge midpoint
        let (x, y) = find_start_coord(90, 50.0);
        assert!((x - 50.0).abs() < 1.0 && y.abs() < 1e-6, "got ({x}, {y})");
        // 180 degrees starts at the right edge midpoint
        let (x, y) = find_start_coord(180, 50.0);
        assert!((x - 100.0).abs() < 1e-6 && (y - 50.0).abs() < 1.0);
    }

    #[test]
    fn linear_end_reflects_start() {
        let geometry = process_pattern(
            &Pattern::Linear { stops: Vec::new() },
            200,
            100,
            0,
        );
        let PatternGeometry::Linear { start, end } = geometry else {
            panic!("expected linear geometry");
        };
        assert!((start.0 + end.0 - 100.0).abs() < 1e-6);
        assert!((start.1 + end.1 - 100.0).abs() < 1e-6);
    }

    #[test]
    fn frame_covers_rectangle_without_overlap() {
        let border = Border::new(Pattern::solid([1.0; 4]), 200, 100, 4, 0);
        let rects = border.strip_rects();
        // top + bottom span the width, sides fill the hole between them
        assert_eq!(rects[0], (200, 4, 0, 0));
        assert_eq!(rects[1], (4, 92, 196, 4));
        assert_eq!(rects[2], (200, 4, 0, 96));
        assert_eq!(rects[3], (4, 92, 0, 4));
        let area: i32 = rects.iter().map(|(w, h, _, _)| w * h).sum();
        assert_eq!(area, 200 * 100 - 192 * 92);
    }

    #[test]
    fn zero_thickness_never_attaches() {
        let mut scene = Scene::new();
        let root = scene.root();
        let tree = scene.create_tree(root, SceneOwner::Empty);
        let mut border = Border::new(Pattern::solid([1.0; 4]), 100, 100, 0, 0);
        border.attach_to_scene(&mut scene, tree, ContainerId(1));
        assert!(!border.is_valid());
        assert_eq!(border.thickness(), 0);
    }
}

//! Small geometry and numeric helpers shared across the crate.
//!
//! Layout coordinates are layer-relative integer pixels throughout; only the
//! cursor moves in f64.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in layout coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64
            && y >= self.y as f64
            && x < (self.x + self.width) as f64
            && y < (self.y + self.height) as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Clamp an integer into `[min, max]`.
pub fn clamp_i32(value: i32, min: i32, max: i32) -> i32 {
    value.max(min).min(max)
}

/// Clamp a float into `[min, max]`.
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Map surface-local coordinates to normalized-device coordinates.
///
/// The toplevel geometry box maps to `[-1, 1]²` with `(0, 0)` at the center.
pub fn surface_coord_to_normdevice_coord(geo: Rect, sx: f64, sy: f64) -> (f64, f64) {
    let nx = sx / (geo.width as f64 / 2.0) - 1.0;
    let ny = sy / (geo.height as f64 / 2.0) - 1.0;
    (nx, ny)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(10, 10, 100, 50);
        assert!(r.contains(10.0, 10.0));
        assert!(r.contains(109.9, 59.9));
        assert!(!r.contains(110.0, 30.0));
        assert!(!r.contains(50.0, 60.0));
    }

    #[test]
    fn normdevice_center_is_origin() {
        let geo = Rect::new(0, 0, 200, 100);
        let (nx, ny) = surface_coord_to_normdevice_coord(geo, 100.0, 50.0);
        assert_eq!((nx, ny), (0.0, 0.0));
        let (nx, ny) = surface_coord_to_normdevice_coord(geo, 0.0, 0.0);
        assert_eq!((nx, ny), (-1.0, -1.0));
        let (nx, ny) = surface_coord_to_normdevice_coord(geo, 200.0, 100.0);
        assert_eq!((nx, ny), (1.0, 1.0));
    }

    #[test]
    fn clamps() {
        assert_eq!(clamp_i32(-5, 0, 10), 0);
        assert_eq!(clamp_i32(15, 0, 10), 10);
        assert_eq!(clamp_f64(0.05, 0.1, 0.9), 0.1);
        assert_eq!(clamp_f64(0.95, 0.1, 0.9), 0.9);
    }
}

//! Axis-Aligned Geometry
//!
//! The only collision shape the simulation needs: rectangles in screen space
//! (origin top-left, y grows downward).

use serde::{Serialize, Deserialize};

/// Axis-aligned rectangle stored as its edges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Right edge
    pub right: f64,
    /// Bottom edge
    pub bottom: f64,
}

impl Rect {
    /// Create from edges.
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    /// Create a rectangle of the given size centred on a point.
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    /// Width of the rectangle.
    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height of the rectangle.
    #[inline]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// A rectangle with no area never collides.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Check if two rectangles overlap (touching edges do not count).
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap() {
        let a = Rect::centered(0.0, 0.0, 10.0, 10.0);
        let b = Rect::centered(8.0, 0.0, 10.0, 10.0);
        let c = Rect::centered(20.0, 0.0, 10.0, 10.0);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_empty_rect_never_overlaps() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let flat = Rect::new(2.0, 5.0, 8.0, 5.0);
        assert!(flat.is_empty());
        assert!(!a.overlaps(&flat));
    }
}

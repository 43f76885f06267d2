use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle in canvas pixel coordinates.
///
/// `x0`/`y0` are inclusive, `x1`/`y1` are exclusive, so `width == x1 - x0`.
/// Used for region snapshots and as a repaint hint for full snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a rectangle from a top-left corner and a size.
    pub fn from_min_size(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Area in pixels. Degenerate rectangles have area zero.
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Clamps the rectangle to a `width` x `height` canvas.
    ///
    /// Callers are expected to clamp before handing a bbox to
    /// `HistoryManager::push`; the history core only compares areas.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.min(width),
            y0: self.y0.min(height),
            x1: self.x1.min(width),
            y1: self.y1.min(height),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_and_size() {
        let r = Rect::from_min_size(10, 20, 30, 40);
        assert_eq!(r.width(), 30);
        assert_eq!(r.height(), 40);
        assert_eq!(r.area(), 1200);
        assert!(!r.is_empty());
    }

    #[test]
    fn degenerate_rect_is_empty() {
        let r = Rect::new(5, 5, 5, 10);
        assert_eq!(r.area(), 0);
        assert!(r.is_empty());
    }

    #[test]
    fn clamp_to_canvas() {
        let r = Rect::new(50, 50, 200, 200).clamp_to(100, 100);
        assert_eq!(r, Rect::new(50, 50, 100, 100));
    }

    #[test]
    fn contains_is_max_exclusive() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains(0, 0));
        assert!(r.contains(9, 9));
        assert!(!r.contains(10, 9));
    }
}

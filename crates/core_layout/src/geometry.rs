//! Integer geometry primitives shared by every quadpos crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// A point in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Per-axis absolute distance to another point.
    pub fn distance_to(&self, other: Point) -> (i32, i32) {
        ((self.x - other.x).abs(), (self.y - other.y).abs())
    }

    /// Check whether both axes are within `tolerance` pixels of `other`.
    pub fn within(&self, other: Point, tolerance: i32) -> bool {
        let (dx, dy) = self.distance_to(other);
        dx <= tolerance && dy <= tolerance
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A width/height pair in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A rectangle in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from an origin and a size.
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Check if this rectangle intersects with another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Check whether a point lies inside this rectangle.
    ///
    /// The left/top edges are inclusive and the right/bottom edges exclusive,
    /// so two rectangles sharing an edge never both claim a point.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// A display resolution, written `WIDTHxHEIGHT` in configuration files.
///
/// Resolutions are the join key between live displays and profile entries,
/// so the string form is canonical: `"3840x2160"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: i32,
    pub height: i32,
}

impl Resolution {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LayoutError::InvalidResolution(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: i32 = w.trim().parse().map_err(|_| invalid())?;
        let height: i32 = h.trim().parse().map_err(|_| invalid())?;
        if width <= 0 || height <= 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(resolution: Resolution) -> Self {
        resolution.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersects() {
        let r1 = Rect::new(0, 0, 100, 100);
        let r2 = Rect::new(50, 50, 100, 100);
        let r3 = Rect::new(200, 200, 50, 50);

        assert!(r1.intersects(&r2));
        assert!(r2.intersects(&r1));
        assert!(!r1.intersects(&r3));
        assert!(!r3.intersects(&r1));
    }

    #[test]
    fn test_rect_contains_is_half_open() {
        let r = Rect::new(0, -2160, 3840, 2160);
        assert!(r.contains(Point::new(0, -2160)));
        assert!(r.contains(Point::new(3839, -1)));
        assert!(!r.contains(Point::new(3840, -1)));
        assert!(!r.contains(Point::new(0, 0)));
    }

    #[test]
    fn test_point_within_tolerance() {
        let target = Point::new(1920, 0);
        assert!(Point::new(1924, 3).within(target, 5));
        assert!(!Point::new(1926, 0).within(target, 5));
        assert_eq!(Point::new(1900, 30).distance_to(target), (20, 30));
    }

    #[test]
    fn test_resolution_parse() {
        let res: Resolution = "3840x2160".parse().unwrap();
        assert_eq!(res, Resolution::new(3840, 2160));
        assert_eq!(res.to_string(), "3840x2160");

        let spaced: Resolution = " 2560 X 1440 ".parse().unwrap();
        assert_eq!(spaced, Resolution::new(2560, 1440));
    }

    #[test]
    fn test_resolution_parse_rejects_garbage() {
        assert!("builtin".parse::<Resolution>().is_err());
        assert!("3840x".parse::<Resolution>().is_err());
        assert!("0x1080".parse::<Resolution>().is_err());
        assert!("-1920x1080".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_serde_as_string() {
        let json = serde_json::to_string(&Resolution::new(2056, 1329)).unwrap();
        assert_eq!(json, "\"2056x1329\"");

        let parsed: Resolution = serde_json::from_str("\"3440x1440\"").unwrap();
        assert_eq!(parsed, Resolution::new(3440, 1440));

        let bad: Result<Resolution, _> = serde_json::from_str("\"wide\"");
        assert!(bad.is_err());
    }
}

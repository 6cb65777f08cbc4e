//! Quadrant partitioning and corner alignment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};
use crate::LayoutError;

/// Window size assumed when the real one cannot be measured.
pub const FALLBACK_WINDOW_SIZE: Size = Size {
    width: 300,
    height: 400,
};

/// One of the four regions of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::TopLeft => "top_left",
            Quadrant::TopRight => "top_right",
            Quadrant::BottomLeft => "bottom_left",
            Quadrant::BottomRight => "bottom_right",
        }
    }

    fn is_right(&self) -> bool {
        matches!(self, Quadrant::TopRight | Quadrant::BottomRight)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Quadrant::BottomLeft | Quadrant::BottomRight)
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quadrant {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quadrant::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| LayoutError::UnknownQuadrant(s.to_string()))
    }
}

/// The four quadrant rectangles of one display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantRects {
    pub top_left: Rect,
    pub top_right: Rect,
    pub bottom_left: Rect,
    pub bottom_right: Rect,
}

impl QuadrantRects {
    pub fn get(&self, quadrant: Quadrant) -> Rect {
        match quadrant {
            Quadrant::TopLeft => self.top_left,
            Quadrant::TopRight => self.top_right,
            Quadrant::BottomLeft => self.bottom_left,
            Quadrant::BottomRight => self.bottom_right,
        }
    }

    /// Iterate in `top_left, top_right, bottom_left, bottom_right` order.
    pub fn iter(&self) -> impl Iterator<Item = (Quadrant, Rect)> + '_ {
        Quadrant::ALL.into_iter().map(move |q| (q, self.get(q)))
    }
}

/// Split a display rectangle (positioning space) into four quadrants.
///
/// `padding` is removed symmetrically from every edge before splitting.
/// Quadrant sizes are floor-divided, so on an odd dimension the right/bottom
/// edge keeps a one-pixel strip outside every quadrant.
pub fn partition(display: Rect, padding: i32) -> QuadrantRects {
    let quad_width = (display.width - 2 * padding) / 2;
    let quad_height = (display.height - 2 * padding) / 2;
    let left = display.x + padding;
    let top = display.y + padding;

    QuadrantRects {
        top_left: Rect::new(left, top, quad_width, quad_height),
        top_right: Rect::new(left + quad_width, top, quad_width, quad_height),
        bottom_left: Rect::new(left, top + quad_height, quad_width, quad_height),
        bottom_right: Rect::new(left + quad_width, top + quad_height, quad_width, quad_height),
    }
}

/// Position a window inside a quadrant so that its corner touches the
/// quadrant's outer corner.
///
/// A window larger than the quadrant overhangs towards the display centre.
pub fn align_to_corner(region: Rect, quadrant: Quadrant, window: Size) -> Point {
    let x = if quadrant.is_right() {
        region.right() - window.width
    } else {
        region.x
    };
    let y = if quadrant.is_bottom() {
        region.bottom() - window.height
    } else {
        region.y
    };
    Point::new(x, y)
}

/// [`align_to_corner`] with an estimate standing in for an unknown size.
pub fn align_or_estimate(
    region: Rect,
    quadrant: Quadrant,
    window: Option<Size>,
    estimate: Size,
) -> Point {
    align_to_corner(region, quadrant, window.unwrap_or(estimate))
}

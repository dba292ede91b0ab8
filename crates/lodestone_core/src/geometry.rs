//! 2D geometry for attraction math
//!
//! Coordinates follow UI convention: origin at the top-left of the root
//! container, y growing downward. All distance comparisons in the controller
//! use an item's *leading edge* rather than its center, approximating which
//! edge will first reach an attraction point above it.

use serde::{Deserialize, Serialize};

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Point) -> f32 {
        distance(*self, other)
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is missing; such measurements are ignored
    pub fn is_zero(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Create a rect from center point and size
    pub fn from_center(center: Point, size: Size) -> Self {
        Rect {
            origin: Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0),
            size,
        }
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    /// Reference point for all distance comparisons: the center lifted
    /// one-quarter height toward the top edge.
    pub fn leading_edge(&self) -> Point {
        let center = self.center();
        Point::new(center.x, center.y - self.size.height / 4.0)
    }
}

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Point at `dist` from `anchor` along the direction toward `toward`.
///
/// Used to synthesize a release target when no original frame was frozen.
/// When the two points coincide the direction degenerates; straight down is
/// used so the item still leaves the attraction point.
pub fn recede_from(anchor: Point, toward: Point, dist: f32) -> Point {
    let dx = toward.x - anchor.x;
    let dy = toward.y - anchor.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON {
        return Point::new(anchor.x, anchor.y + dist);
    }
    Point::new(anchor.x + dx / len * dist, anchor.y + dy / len * dist)
}

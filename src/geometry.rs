//! 2D geometry primitives shared by every track shape.
//!
//! - [`Point2D`]: value-type point/vector in layout units
//! - [`CubicBezier`]: the curve behind curved tracks, with evaluation,
//!   derivative, de Casteljau splitting and arc length
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::geometry::{CubicBezier, Point2D};
//!
//! let curve = CubicBezier::new(
//!     Point2D::new(0.0, 0.0),
//!     Point2D::new(10.0, 0.0),
//!     Point2D::new(20.0, 0.0),
//!     Point2D::new(30.0, 0.0),
//! );
//! assert!((curve.length() - 30.0).abs() < 1e-9);
//! ```

use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Tolerance used when checking whether two track endpoints coincide.
pub const CONNECTION_TOLERANCE: f64 = 1e-7;

/// A point (or displacement) in layout coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate (grows downwards on screen).
    pub y: f64,
}

impl Point2D {
    /// The origin.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point from its coordinates.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    #[inline]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Euclidean norm.
    #[inline]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Distance between two points.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Unit vector with the same direction, or the zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Self::ORIGIN
        } else {
            self * (1.0 / len)
        }
    }

    /// Rotate counter-clockwise (in a y-up frame) by `angle` radians.
    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Linear interpolation, `t = 0` gives `self` and `t = 1` gives `other`.
    #[inline]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    /// Angle of this vector from the +x axis, in radians.
    #[inline]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Whether two points coincide within [`CONNECTION_TOLERANCE`].
    #[inline]
    pub fn touches(self, other: Self) -> bool {
        self.distance(other) <= CONNECTION_TOLERANCE
    }
}

impl Add for Point2D {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point2D {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// ============================================================================
// Cubic Bezier
// ============================================================================

/// Subintervals used by the composite quadrature in [`CubicBezier::length`].
const QUADRATURE_PANELS: usize = 16;

/// 5-point Gauss-Legendre abscissae on [-1, 1].
const GAUSS_NODES: [f64; 5] = [
    0.0,
    -0.538_469_310_105_683_1,
    0.538_469_310_105_683_1,
    -0.906_179_845_938_664_0,
    0.906_179_845_938_664_0,
];

/// Weights matching [`GAUSS_NODES`].
const GAUSS_WEIGHTS: [f64; 5] = [
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
    0.236_926_885_056_189_1,
];

/// A cubic Bezier curve given by its four control points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    /// Control points, `points[0]` is the start and `points[3]` the end.
    pub points: [Point2D; 4],
}

impl CubicBezier {
    /// Create a curve from start, two handles and end.
    pub const fn new(start: Point2D, control1: Point2D, control2: Point2D, end: Point2D) -> Self {
        Self {
            points: [start, control1, control2, end],
        }
    }

    /// First control point.
    #[inline]
    pub fn start(&self) -> Point2D {
        self.points[0]
    }

    /// Last control point.
    #[inline]
    pub fn end(&self) -> Point2D {
        self.points[3]
    }

    /// Point on the curve at parameter `t` in [0, 1].
    pub fn point(&self, t: f64) -> Point2D {
        let [p0, p1, p2, p3] = self.points;
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        Point2D::new(
            a * p0.x + b * p1.x + c * p2.x + d * p3.x,
            a * p0.y + b * p1.y + c * p2.y + d * p3.y,
        )
    }

    /// First derivative with respect to `t`.
    pub fn derivative(&self, t: f64) -> Point2D {
        let [p0, p1, p2, p3] = self.points;
        let mt = 1.0 - t;
        (p1 - p0) * (3.0 * mt * mt) + (p2 - p1) * (6.0 * mt * t) + (p3 - p2) * (3.0 * t * t)
    }

    /// Split at `t` with de Casteljau's algorithm into `[0, t]` and `[t, 1]`.
    pub fn split(&self, t: f64) -> (CubicBezier, CubicBezier) {
        let [p0, p1, p2, p3] = self.points;
        let p01 = p0.lerp(p1, t);
        let p12 = p1.lerp(p2, t);
        let p23 = p2.lerp(p3, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let mid = p012.lerp(p123, t);
        (
            CubicBezier::new(p0, p01, p012, mid),
            CubicBezier::new(mid, p123, p23, p3),
        )
    }

    /// Arc length of the whole curve.
    pub fn length(&self) -> f64 {
        let width = 1.0 / QUADRATURE_PANELS as f64;
        let mut total = 0.0;
        for panel in 0..QUADRATURE_PANELS {
            let center = (panel as f64 + 0.5) * width;
            for (node, weight) in GAUSS_NODES.iter().zip(GAUSS_WEIGHTS.iter()) {
                let t = center + node * width / 2.0;
                total += weight * self.derivative(t).length();
            }
        }
        total * width / 2.0
    }

    /// Arc length from the start of the curve up to parameter `t`.
    pub fn length_to(&self, t: f64) -> f64 {
        if t <= 0.0 {
            0.0
        } else if t >= 1.0 {
            self.length()
        } else {
            self.split(t).0.length()
        }
    }
}

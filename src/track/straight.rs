//! Straight track segment.

use super::Follow;
use crate::geometry::Point2D;

/// Relative slack on the segment parameter before a solution counts as
/// lying on a neighbor.
const SEGMENT_SLACK: f64 = 1e-9;

/// A straight segment from `points[0]` to `points[1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct StraightTrack {
    points: [Point2D; 2],
    length: f64,
}

impl StraightTrack {
    /// Segment between two points.
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self {
            points: [start, end],
            length: start.distance(end),
        }
    }

    /// Head end.
    pub fn start(&self) -> Point2D {
        self.points[0]
    }

    /// Tail end.
    pub fn end(&self) -> Point2D {
        self.points[1]
    }

    /// Segment length.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Start and end.
    pub fn control_points(&self) -> &[Point2D] {
        &self.points
    }

    /// Point at `distance` from the start. The caller validates the range.
    pub(crate) fn point_at(&self, distance: f64) -> Point2D {
        if distance >= self.length {
            return self.end();
        }
        self.start().lerp(self.end(), distance / self.length)
    }

    /// Unit direction from start to end.
    pub(crate) fn tangent(&self) -> Point2D {
        (self.end() - self.start()).normalize()
    }

    /// Intersect the circle of radius `spacing` around `active` with this
    /// segment's line and keep the root nearest the previous passive point.
    pub(crate) fn follow(&self, passive_distance: f64, active: Point2D, spacing: f64) -> Follow {
        let start = self.start();
        let end = self.end();
        let passive = self.point_at(passive_distance);

        let d = end - start;
        let dr2 = d.dot(d);
        if dr2 == 0.0 {
            return Follow::NoSolution;
        }

        let area = (start - active).cross(end - active);
        let discriminant = spacing * spacing * dr2 - area * area;
        if discriminant < 0.0 {
            return Follow::NoSolution;
        }

        let root = discriminant.sqrt();
        let sign = if d.y < 0.0 { -1.0 } else { 1.0 };
        let spread = Point2D::new(sign * d.x * root, d.y.abs() * root);
        let base = Point2D::new(area * d.y, -area * d.x);
        let first = active + (base + spread) * (1.0 / dr2);
        let second = active + (base - spread) * (1.0 / dr2);

        let p = if passive.distance(first) < passive.distance(second) {
            first
        } else {
            second
        };

        let u = (p - start).dot(d) / dr2;
        if u < -SEGMENT_SLACK {
            Follow::BeyondStart
        } else if u > 1.0 + SEGMENT_SLACK {
            Follow::BeyondEnd
        } else {
            Follow::Found {
                distance: (u * self.length).clamp(0.0, self.length),
                forward: active.distance(start) > p.distance(start),
                position: p,
            }
        }
    }
}

//! Curved track segment backed by a cubic Bezier.
//!
//! The curve parameter `t` is not proportional to arc length, so every
//! distance query goes through [`BezierTrack::distance_to_t`], a safeguarded
//! interpolation search over the arc-length function.

use super::Follow;
use crate::geometry::{CubicBezier, Point2D};

/// Relative tolerance of [`BezierTrack::distance_to_t`].
pub const DISTANCE_TOLERANCE: f64 = 1e-6;

/// Iteration cap for both root searches.
const MAX_ITERATIONS: usize = 100;

/// Bracket width in `t` at which bisection stops.
const T_TOLERANCE: f64 = 1e-12;

/// Scan samples per `spacing` of arc length when looking for a crossing.
const SCAN_DENSITY: f64 = 4.0;

/// Upper bound on scan samples over one curve.
const MAX_SCAN_STEPS: usize = 1024;

/// A curved segment.
#[derive(Clone, Debug, PartialEq)]
pub struct BezierTrack {
    curve: CubicBezier,
    length: f64,
}

impl BezierTrack {
    /// Curved segment following `curve`.
    pub fn new(curve: CubicBezier) -> Self {
        Self {
            length: curve.length(),
            curve,
        }
    }

    /// Underlying curve.
    pub fn curve(&self) -> &CubicBezier {
        &self.curve
    }

    /// Head end.
    pub fn start(&self) -> Point2D {
        self.curve.start()
    }

    /// Tail end.
    pub fn end(&self) -> Point2D {
        self.curve.end()
    }

    /// Arc length.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The four control points.
    pub fn control_points(&self) -> &[Point2D] {
        &self.curve.points
    }

    /// Curve parameter at arc length `distance`, or `None` outside `[0, length]`.
    pub fn distance_to_t(&self, distance: f64) -> Option<f64> {
        if !(0.0..=self.length).contains(&distance) {
            return None;
        }
        if distance == 0.0 {
            return Some(0.0);
        }
        if distance == self.length {
            return Some(1.0);
        }

        // Illinois variant of regula falsi on f(t) = length_to(t) - distance
        let (mut lower, mut upper) = (0.0, 1.0);
        let (mut f_lower, mut f_upper) = (-distance, self.length - distance);
        let mut last_side = 0i8;
        let mut t = distance / self.length;
        for _ in 0..MAX_ITERATIONS {
            let span = f_upper - f_lower;
            t = if span > 0.0 {
                lower - f_lower * (upper - lower) / span
            } else {
                (lower + upper) / 2.0
            };
            let f = self.curve.length_to(t) - distance;
            if (f / distance).abs() < DISTANCE_TOLERANCE {
                break;
            }
            if f > 0.0 {
                upper = t;
                f_upper = f;
                if last_side == 1 {
                    f_lower /= 2.0;
                }
                last_side = 1;
            } else {
                lower = t;
                f_lower = f;
                if last_side == -1 {
                    f_upper /= 2.0;
                }
                last_side = -1;
            }
        }
        Some(t)
    }

    /// Point at `distance`. The caller validates the range.
    pub(crate) fn point_at(&self, distance: f64) -> Point2D {
        self.curve.point(self.t_or_clamped(distance))
    }

    /// Unit tangent at `distance`, pointing towards increasing distance.
    pub(crate) fn tangent_at(&self, distance: f64) -> Point2D {
        self.curve.derivative(self.t_or_clamped(distance)).normalize()
    }

    fn t_or_clamped(&self, distance: f64) -> f64 {
        self.distance_to_t(distance.clamp(0.0, self.length)).unwrap_or(0.0)
    }

    /// Find the point of the curve at exactly `spacing` from `active`.
    ///
    /// Scans from the passive wheel's current parameter towards the side it
    /// has to move to, then bisects the first sub-interval where the gap
    /// crosses `spacing`. The search never jumps over the current parameter,
    /// and a scan that reaches an endpoint without a crossing hands off to
    /// the neighbor on that side.
    pub(crate) fn follow(&self, passive_distance: f64, active: Point2D, spacing: f64) -> Follow {
        let t0 = self.t_or_clamped(passive_distance);
        let passive = self.curve.point(t0);
        let alignment = self.curve.derivative(t0).dot(active - passive);
        if alignment == 0.0 {
            return Follow::NoSolution;
        }

        // `forward`: the active wheel lies towards increasing t.
        let forward = alignment > 0.0;
        let tolerance = DISTANCE_TOLERANCE * spacing;
        let gap = passive.distance(active) - spacing;
        if gap.abs() <= tolerance {
            return self.found(t0, forward);
        }

        // `pulling`: the passive wheel must close the gap.
        let pulling = gap > 0.0;
        let towards_end = forward == pulling;
        let target = if towards_end { 1.0 } else { 0.0 };

        let reach = self.length * (target - t0).abs();
        let steps = ((SCAN_DENSITY * reach / spacing).ceil() as usize).clamp(1, MAX_SCAN_STEPS);
        let mut previous = t0;
        for step in 1..=steps {
            let t = t0 + (target - t0) * step as f64 / steps as f64;
            let h = self.curve.point(t).distance(active) - spacing;
            if h == 0.0 || (h > 0.0) != pulling {
                let t = self.bisect(previous, t, active, spacing, tolerance);
                return self.found(t, forward);
            }
            previous = t;
        }

        if towards_end {
            Follow::BeyondEnd
        } else {
            Follow::BeyondStart
        }
    }

    /// Bisect `[a, b]` (in either order) for the parameter at `spacing` from
    /// `active`. The gap at `a` must lie on the other side of `spacing` than
    /// the gap at `b`.
    fn bisect(&self, mut a: f64, mut b: f64, active: Point2D, spacing: f64, tolerance: f64) -> f64 {
        let a_outside = self.curve.point(a).distance(active) > spacing;
        let mut t = b;
        for _ in 0..MAX_ITERATIONS {
            t = (a + b) / 2.0;
            let h = self.curve.point(t).distance(active) - spacing;
            if h.abs() <= tolerance || (b - a).abs() < T_TOLERANCE {
                break;
            }
            if (h > 0.0) == a_outside {
                a = t;
            } else {
                b = t;
            }
        }
        t
    }

    fn found(&self, t: f64, forward: bool) -> Follow {
        Follow::Found {
            distance: self.curve.length_to(t).clamp(0.0, self.length),
            forward,
            position: self.curve.point(t),
        }
    }
}

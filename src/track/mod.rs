//! Rail segments and their shapes.
//!
//! Every segment is a [`Track`]: an id, a [`TrackShape`], two optional
//! [`Connection`]s and the sensors mounted on it. Tracks refer to their
//! neighbors by id; the [`Layout`](crate::layout::Layout) arena resolves them.
//!
//! | Shape | Length | Position | Passive follow |
//! |-------|--------|----------|----------------|
//! | [`StraightTrack`] | chord | linear interpolation | circle/line intersection |
//! | [`BezierTrack`] | arc length | arc-length search on `t` | scan + bisection on `t` |
//! | [`Switch`] | 0 | its position | forwarded to a neighbor |
//!
//! # Orientation
//!
//! The head of a track is at distance 0 and its tail at `length`. A
//! connection `{ track, head }` stored on the `previous` (head) or `next`
//! (tail) side names the neighbor and which of *its* ends touches.

mod bezier;
mod straight;
mod switch;

pub use bezier::{BezierTrack, DISTANCE_TOLERANCE};
pub use straight::StraightTrack;
pub use switch::{Switch, SwitchDirection};

use thiserror::Error;

use crate::geometry::{CubicBezier, Point2D};
use crate::sensor::Sensor;

/// Track identifier, unique across a layout.
pub type TrackId = u32;

// ============================================================================
// Errors
// ============================================================================

/// Layout construction errors and violated preconditions.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TrackError {
    /// The requested ends of two tracks do not coincide.
    #[error("track connection mismatch between {a} and {b}")]
    ConnectionMismatch {
        /// First track.
        a: TrackId,
        /// Second track.
        b: TrackId,
    },

    /// No pair of endpoints of the two tracks coincide.
    #[error("tracks {a} and {b} have no touching endpoints")]
    NoTouchingEndpoints {
        /// First track.
        a: TrackId,
        /// Second track.
        b: TrackId,
    },

    /// A switch neighbor does not touch the switch.
    #[error("switch {switch} and track {track} are not adjacent")]
    SwitchNotAdjacent {
        /// The switch.
        switch: TrackId,
        /// The neighbor.
        track: TrackId,
    },

    /// A sensor name does not follow the module/contact convention.
    #[error("invalid sensor name {0:?}")]
    InvalidSensorName(String),

    /// A distance outside `[0, length]`.
    #[error("invalid distance {distance} on track {track} of length {length}")]
    InvalidDistance {
        /// The track queried.
        track: TrackId,
        /// The requested distance.
        distance: f64,
        /// The track's length.
        length: f64,
    },

    /// Wheel spacing must be positive and finite.
    #[error("invalid wheel spacing {0}")]
    InvalidSpacing(f64),

    /// No track with this id exists.
    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    /// The track exists but is not a switch.
    #[error("track {0} is not a switch")]
    NotASwitch(TrackId),

    /// Traversal kept going without settling.
    #[error("traversal through track {0} did not terminate")]
    TraversalLoop(TrackId),

    /// A switch was entered from a track it is not connected to.
    #[error("switch {0} entered from an unconnected side")]
    SwitchWithoutRoute(TrackId),
}

// ============================================================================
// Connections and positions
// ============================================================================

/// One end of a link between two tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// The neighbor.
    pub track: TrackId,
    /// Whether the neighbor's head (true) or tail (false) touches.
    pub head: bool,
}

impl Connection {
    /// Create a connection record.
    pub const fn new(track: TrackId, head: bool) -> Self {
        Self { track, head }
    }
}

/// A resolved point on the layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionOnTrack {
    /// Track the point lies on.
    pub track: TrackId,
    /// Arc length from the track's head.
    pub distance: f64,
    /// Whether travel is towards the tail.
    pub forward: bool,
    /// World coordinates.
    pub position: Point2D,
}

/// Outcome of a passive-wheel search local to one track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Follow {
    /// A point at the requested spacing lies on this track.
    Found {
        /// Arc length from the head.
        distance: f64,
        /// Whether the active wheel lies towards the tail.
        forward: bool,
        /// World coordinates.
        position: Point2D,
    },
    /// The solution lies past the head.
    BeyondStart,
    /// The solution lies past the tail.
    BeyondEnd,
    /// The passive wheel cannot stay coupled on this track.
    NoSolution,
}

// ============================================================================
// Track
// ============================================================================

/// Shape-specific part of a track.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackShape {
    /// Straight segment.
    Straight(StraightTrack),
    /// Cubic Bezier curve.
    Bezier(BezierTrack),
    /// Zero-length switch.
    Switch(Switch),
}

/// A node of the track graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    id: TrackId,
    shape: TrackShape,
    previous: Option<Connection>,
    next: Option<Connection>,
    sensors: Vec<Sensor>,
}

impl Track {
    /// Track with the given shape and no connections.
    pub fn new(id: TrackId, shape: TrackShape) -> Self {
        Self {
            id,
            shape,
            previous: None,
            next: None,
            sensors: Vec::new(),
        }
    }

    /// Straight track from `start` to `end`.
    pub fn straight(id: TrackId, start: Point2D, end: Point2D) -> Self {
        Self::new(id, TrackShape::Straight(StraightTrack::new(start, end)))
    }

    /// Curved track following `curve`.
    pub fn bezier(id: TrackId, curve: CubicBezier) -> Self {
        Self::new(id, TrackShape::Bezier(BezierTrack::new(curve)))
    }

    /// Switch at `position`, named after its id.
    pub fn switch(id: TrackId, position: Point2D) -> Self {
        let name = format!("{id}");
        Self::new(id, TrackShape::Switch(Switch::new(position).with_name(&name)))
    }

    /// Attach a sensor.
    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Identifier.
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Shape data.
    pub fn shape(&self) -> &TrackShape {
        &self.shape
    }

    /// Switch state, if this track is a switch.
    pub fn as_switch(&self) -> Option<&Switch> {
        match &self.shape {
            TrackShape::Switch(sw) => Some(sw),
            _ => None,
        }
    }

    /// Mutable switch state, if this track is a switch.
    pub fn as_switch_mut(&mut self) -> Option<&mut Switch> {
        match &mut self.shape {
            TrackShape::Switch(sw) => Some(sw),
            _ => None,
        }
    }

    /// Head end.
    pub fn start(&self) -> Point2D {
        match &self.shape {
            TrackShape::Straight(s) => s.start(),
            TrackShape::Bezier(b) => b.start(),
            TrackShape::Switch(sw) => sw.position(),
        }
    }

    /// Tail end.
    pub fn end(&self) -> Point2D {
        match &self.shape {
            TrackShape::Straight(s) => s.end(),
            TrackShape::Bezier(b) => b.end(),
            TrackShape::Switch(sw) => sw.position(),
        }
    }

    /// Head (`true`) or tail (`false`) end.
    pub fn endpoint(&self, head: bool) -> Point2D {
        if head {
            self.start()
        } else {
            self.end()
        }
    }

    /// Arc length; 0 for switches.
    pub fn length(&self) -> f64 {
        match &self.shape {
            TrackShape::Straight(s) => s.length(),
            TrackShape::Bezier(b) => b.length(),
            TrackShape::Switch(_) => 0.0,
        }
    }

    /// Distance at which a wheel entering through the head or tail starts.
    pub fn entry_distance(&self, head: bool) -> f64 {
        if head {
            0.0
        } else {
            self.length()
        }
    }

    /// Neighbor on the head side.
    pub fn previous(&self) -> Option<Connection> {
        self.previous
    }

    /// Neighbor on the tail side; the online route for switches.
    pub fn next(&self) -> Option<Connection> {
        match &self.shape {
            TrackShape::Switch(sw) => sw.online(),
            _ => self.next,
        }
    }

    /// Parked route of a switch.
    pub fn offline(&self) -> Option<Connection> {
        self.as_switch().and_then(Switch::offline)
    }

    pub(crate) fn set_previous(&mut self, connection: Connection) {
        self.previous = Some(connection);
    }

    /// Bind the tail side. On a switch this binds the route of the current
    /// direction.
    pub(crate) fn set_next(&mut self, connection: Connection) {
        match &mut self.shape {
            TrackShape::Switch(sw) => {
                let direction = sw.direction();
                sw.bind(direction, connection);
            }
            _ => self.next = Some(connection),
        }
    }

    pub(crate) fn set_side(&mut self, head: bool, connection: Connection) {
        if head {
            self.set_previous(connection);
        } else {
            self.set_next(connection);
        }
    }

    /// Mounted sensors.
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    fn check_distance(&self, distance: f64) -> Result<(), TrackError> {
        let length = self.length();
        if (0.0..=length).contains(&distance) {
            Ok(())
        } else {
            Err(TrackError::InvalidDistance {
                track: self.id,
                distance,
                length,
            })
        }
    }

    /// World position at `distance` from the head.
    pub fn position_at(&self, distance: f64) -> Result<Point2D, TrackError> {
        self.check_distance(distance)?;
        Ok(match &self.shape {
            TrackShape::Straight(s) => s.point_at(distance),
            TrackShape::Bezier(b) => b.point_at(distance),
            TrackShape::Switch(sw) => sw.position(),
        })
    }

    /// Unit direction of increasing distance; zero for switches.
    pub fn tangent_at(&self, distance: f64) -> Result<Point2D, TrackError> {
        self.check_distance(distance)?;
        Ok(match &self.shape {
            TrackShape::Straight(s) => s.tangent(),
            TrackShape::Bezier(b) => b.tangent_at(distance),
            TrackShape::Switch(_) => Point2D::ORIGIN,
        })
    }

    /// Defining points for rendering: 2 for straight, 4 for Bezier, the
    /// position for a switch.
    pub fn control_points(&self) -> &[Point2D] {
        match &self.shape {
            TrackShape::Straight(s) => s.control_points(),
            TrackShape::Bezier(b) => b.control_points(),
            TrackShape::Switch(sw) => core::slice::from_ref(sw.position_ref()),
        }
    }

    /// Sensors triggered by a wheel at `distance` travelling `forward`.
    pub fn sensors_at(&self, distance: f64, forward: bool) -> impl Iterator<Item = &Sensor> + '_ {
        let length = self.length();
        self.sensors
            .iter()
            .filter(move |s| s.is_triggered(length, distance, forward))
    }

    /// Solve the passive-wheel constraint on this track alone.
    ///
    /// Switches have no extent; the layout routes through them.
    pub(crate) fn follow_local(
        &self,
        passive_distance: f64,
        active: Point2D,
        spacing: f64,
    ) -> Result<Follow, TrackError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(TrackError::InvalidSpacing(spacing));
        }
        self.check_distance(passive_distance)?;
        Ok(match &self.shape {
            TrackShape::Straight(s) => s.follow(passive_distance, active, spacing),
            TrackShape::Bezier(b) => b.follow(passive_distance, active, spacing),
            TrackShape::Switch(_) => return Err(TrackError::SwitchWithoutRoute(self.id)),
        })
    }
}

//! The track graph.
//!
//! [`Layout`] is an arena of [`Track`]s keyed by id. Links are stored as
//! `(id, head)` pairs on each track, so loops in the layout never become
//! ownership cycles.
//!
//! # Traversal
//!
//! - [`Layout::advance`] moves an active wheel a given distance, carrying
//!   overflow into neighbors. It returns `Ok(None)` when the graph ends.
//! - [`Layout::follow`] places a passive wheel at a fixed spacing from the
//!   active one. Each shape solves locally; the layout hands off to the
//!   neighbor the shape points at, never going back to the track it came from.
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::{geometry::Point2D, layout::Layout, track::Track};
//!
//! let mut layout = Layout::new();
//! layout.insert(Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(50.0, 0.0)));
//! layout.insert(Track::straight(2, Point2D::new(50.0, 0.0), Point2D::new(100.0, 0.0)));
//! layout.connect(1, false, 2, true).unwrap();
//!
//! let start = layout.place(1, 40.0, true).unwrap();
//! let moved = layout.advance(&start, 20.0).unwrap().unwrap();
//! assert_eq!(moved.track, 2);
//! assert!((moved.distance - 10.0).abs() < 1e-9);
//! ```

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::geometry::Point2D;
use crate::track::{
    Connection, Follow, PositionOnTrack, Switch, SwitchDirection, Track, TrackError, TrackId,
};

/// How many times an active wheel may go round the whole layout in one move.
const MAX_LAPS: usize = 16;

/// Arena of tracks.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    tracks: BTreeMap<TrackId, Track>,
}

impl Layout {
    /// Empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track, returning the one it replaced.
    pub fn insert(&mut self, track: Track) -> Option<Track> {
        self.tracks.insert(track.id(), track)
    }

    /// Number of tracks, switches included.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the layout has no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track by id.
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Track by id, or [`TrackError::UnknownTrack`].
    pub fn track(&self, id: TrackId) -> Result<&Track, TrackError> {
        self.tracks.get(&id).ok_or(TrackError::UnknownTrack(id))
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, TrackError> {
        self.tracks.get_mut(&id).ok_or(TrackError::UnknownTrack(id))
    }

    /// All tracks in id order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.values()
    }

    /// All switches in id order.
    pub fn switches(&self) -> impl Iterator<Item = (TrackId, &Switch)> + '_ {
        self.tracks
            .values()
            .filter_map(|t| t.as_switch().map(|sw| (t.id(), sw)))
    }

    /// Ids of all switches in id order.
    pub fn switch_ids(&self) -> Vec<TrackId> {
        self.switches().map(|(id, _)| id).collect()
    }

    /// Switch state by id.
    pub fn switch(&self, id: TrackId) -> Result<&Switch, TrackError> {
        self.track(id)?.as_switch().ok_or(TrackError::NotASwitch(id))
    }

    /// Mutable switch state by id.
    pub fn switch_mut(&mut self, id: TrackId) -> Result<&mut Switch, TrackError> {
        self.track_mut(id)?
            .as_switch_mut()
            .ok_or(TrackError::NotASwitch(id))
    }

    /// Largest sensor id mounted anywhere.
    pub fn max_sensor_id(&self) -> Option<u32> {
        self.tracks
            .values()
            .flat_map(|t| t.sensors().iter().map(|s| s.id))
            .max()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Join end `head_a` of track `a` to end `head_b` of track `b`.
    ///
    /// Fails unless the two ends coincide within
    /// [`CONNECTION_TOLERANCE`](crate::geometry::CONNECTION_TOLERANCE). The
    /// link is recorded on both tracks.
    pub fn connect(
        &mut self,
        a: TrackId,
        head_a: bool,
        b: TrackId,
        head_b: bool,
    ) -> Result<(), TrackError> {
        let end_a = self.track(a)?.endpoint(head_a);
        let end_b = self.track(b)?.endpoint(head_b);
        if !end_a.touches(end_b) {
            return Err(TrackError::ConnectionMismatch { a, b });
        }
        self.track_mut(a)?
            .set_side(head_a, Connection::new(b, head_b));
        self.track_mut(b)?
            .set_side(head_b, Connection::new(a, head_a));
        Ok(())
    }

    /// Join two tracks at whichever pair of ends touches.
    ///
    /// Tail-to-head is tried first, then head-to-tail, tail-to-tail and
    /// head-to-head.
    pub fn connect_auto(&mut self, a: TrackId, b: TrackId) -> Result<(), TrackError> {
        let track_a = self.track(a)?;
        let track_b = self.track(b)?;
        let pair = [(false, true), (true, false), (false, false), (true, true)]
            .into_iter()
            .find(|&(head_a, head_b)| track_a.endpoint(head_a).touches(track_b.endpoint(head_b)));
        match pair {
            Some((head_a, head_b)) => self.connect(a, head_a, b, head_b),
            None => Err(TrackError::NoTouchingEndpoints { a, b }),
        }
    }

    /// Bind a switch's branch (previous side) and its straight and curve
    /// routes. The switch keeps its current direction.
    pub fn connect_switch(
        &mut self,
        switch: TrackId,
        branch: TrackId,
        straight: TrackId,
        curve: TrackId,
    ) -> Result<(), TrackError> {
        let position = self.switch(switch)?.position();
        let branch_head = self.adjacent_end(switch, position, branch)?;
        let straight_head = self.adjacent_end(switch, position, straight)?;
        let curve_head = self.adjacent_end(switch, position, curve)?;

        let track = self.track_mut(switch)?;
        track.set_previous(Connection::new(branch, branch_head));
        if let Some(sw) = track.as_switch_mut() {
            sw.bind(
                SwitchDirection::Straight,
                Connection::new(straight, straight_head),
            );
            sw.bind(SwitchDirection::Curve, Connection::new(curve, curve_head));
        }

        self.track_mut(branch)?
            .set_side(branch_head, Connection::new(switch, true));
        self.track_mut(straight)?
            .set_side(straight_head, Connection::new(switch, false));
        self.track_mut(curve)?
            .set_side(curve_head, Connection::new(switch, false));
        Ok(())
    }

    /// Which end of `track` touches the switch at `position`.
    fn adjacent_end(
        &self,
        switch: TrackId,
        position: Point2D,
        track: TrackId,
    ) -> Result<bool, TrackError> {
        let neighbor = self.track(track)?;
        if neighbor.start().touches(position) {
            Ok(true)
        } else if neighbor.end().touches(position) {
            Ok(false)
        } else {
            Err(TrackError::SwitchNotAdjacent { switch, track })
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Resolve a point on a track.
    pub fn place(
        &self,
        track: TrackId,
        distance: f64,
        forward: bool,
    ) -> Result<PositionOnTrack, TrackError> {
        let position = self.track(track)?.position_at(distance)?;
        Ok(PositionOnTrack {
            track,
            distance,
            forward,
            position,
        })
    }

    /// Move an active wheel `displacement` along its direction of travel.
    ///
    /// Entering a neighbor through its head continues towards its tail and
    /// vice versa. Returns `Ok(None)` when the graph has no connection on the
    /// side the wheel runs off.
    pub fn advance(
        &self,
        wheel: &PositionOnTrack,
        displacement: f64,
    ) -> Result<Option<PositionOnTrack>, TrackError> {
        let mut id = wheel.track;
        let mut distance = wheel.distance;
        let mut forward = wheel.forward;
        let mut remaining = displacement;

        let max_hops = self.tracks.len().saturating_mul(MAX_LAPS).max(1);
        for _ in 0..=max_hops {
            let track = self.track(id)?;
            let length = track.length();
            let target = if forward {
                distance + remaining
            } else {
                distance - remaining
            };

            let (connection, overflow) = if target > length {
                (track.next(), target - length)
            } else if target < 0.0 {
                (track.previous(), -target)
            } else {
                return Ok(Some(PositionOnTrack {
                    track: id,
                    distance: target,
                    forward,
                    position: track.position_at(target)?,
                }));
            };

            let Some(connection) = connection else {
                return Ok(None);
            };
            let neighbor = self.track(connection.track)?;
            id = connection.track;
            distance = neighbor.entry_distance(connection.head);
            forward = connection.head;
            remaining = overflow;
        }
        Err(TrackError::TraversalLoop(id))
    }

    /// Place a passive wheel at `spacing` from `active`, starting the search
    /// from its previous position.
    ///
    /// Returns `Ok(None)` when no track reachable without doubling back
    /// keeps the spacing. Dragging the wheel through a switch from its
    /// offline route succeeds but emits [`Diagnostic::UnsafeSwitch`].
    pub fn follow(
        &self,
        passive: &PositionOnTrack,
        active: Point2D,
        spacing: f64,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Option<PositionOnTrack>, TrackError> {
        self.follow_from(passive.track, passive.distance, active, spacing, None, 0, sink)
    }

    #[allow(clippy::too_many_arguments)]
    fn follow_from(
        &self,
        id: TrackId,
        distance: f64,
        active: Point2D,
        spacing: f64,
        from: Option<TrackId>,
        depth: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Option<PositionOnTrack>, TrackError> {
        if depth > self.tracks.len() {
            return Err(TrackError::TraversalLoop(id));
        }
        let track = self.track(id)?;

        if let Some(sw) = track.as_switch() {
            let from = from.ok_or(TrackError::SwitchWithoutRoute(id))?;
            let came_from = |c: Option<Connection>| c.map(|c| c.track) == Some(from);
            let target = if came_from(sw.online()) {
                track.previous()
            } else if came_from(track.previous()) {
                sw.online()
            } else if came_from(sw.offline()) {
                sink.emit(Diagnostic::UnsafeSwitch { switch: id, from });
                track.previous()
            } else {
                return Err(TrackError::SwitchWithoutRoute(id));
            };
            return self.hand_off(id, target, None, active, spacing, depth, sink);
        }

        match track.follow_local(distance, active, spacing)? {
            Follow::Found {
                distance,
                forward,
                position,
            } => Ok(Some(PositionOnTrack {
                track: id,
                distance,
                forward,
                position,
            })),
            Follow::NoSolution => Ok(None),
            Follow::BeyondStart => {
                self.hand_off(id, track.previous(), from, active, spacing, depth, sink)
            }
            Follow::BeyondEnd => self.hand_off(id, track.next(), from, active, spacing, depth, sink),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn hand_off(
        &self,
        origin: TrackId,
        connection: Option<Connection>,
        excluded: Option<TrackId>,
        active: Point2D,
        spacing: f64,
        depth: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Option<PositionOnTrack>, TrackError> {
        let Some(connection) = connection else {
            return Ok(None);
        };
        if Some(connection.track) == excluded {
            return Ok(None);
        }
        let entry = self.track(connection.track)?.entry_distance(connection.head);
        self.follow_from(
            connection.track,
            entry,
            active,
            spacing,
            Some(origin),
            depth + 1,
            sink,
        )
    }
}

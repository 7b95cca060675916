//! Snapshot payloads for renderers and telemetry.
//!
//! A full snapshot carries every train with its dimensions, every track's
//! control points, every switch route and the static switch and sensor
//! metadata. A delta snapshot carries only trains and switches whose dirty
//! flags were set, and omits geometry (`straightTracks`/`bezierTracks` are
//! `null`).
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;
use crate::layout::Layout;
use crate::sensor::{Sensor, SensorId};
use crate::track::{Connection, Switch, SwitchDirection, Track, TrackId, TrackShape};
use crate::train::{Train, TrainId};

/// One snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickPayload {
    /// Milliseconds since the controller was created.
    pub time: u64,
    /// True for a full snapshot.
    pub object_changed: bool,
    /// True when track geometry is included.
    pub draw_track: bool,
    /// Trains included in this snapshot.
    pub trains: Vec<TrainState>,
    /// Control points of every straight track (full only).
    pub straight_tracks: Option<Vec<Vec<Point2D>>>,
    /// Control points of every curved track (full only).
    pub bezier_tracks: Option<Vec<Vec<Point2D>>>,
    /// Straight tracks currently online at an included switch.
    pub online_switch_straight_tracks: Vec<TrackPortion>,
    /// Straight tracks currently offline at an included switch.
    pub offline_switch_straight_tracks: Vec<TrackPortion>,
    /// Curved tracks currently online at an included switch.
    pub online_switch_bezier_tracks: Vec<TrackPortion>,
    /// Curved tracks currently offline at an included switch.
    pub offline_switch_bezier_tracks: Vec<TrackPortion>,
    /// Direction of every included switch.
    pub switch_directions: Vec<SwitchState>,
    /// Switch metadata (full only).
    pub switches: Vec<SwitchMetadata>,
    /// Sensor metadata (full only).
    pub sensors: Vec<SensorMetadata>,
}

impl TickPayload {
    /// Empty payload of the given kind.
    pub fn new(time: u64, full: bool) -> Self {
        Self {
            time,
            object_changed: full,
            draw_track: full,
            straight_tracks: full.then(Vec::new),
            bezier_tracks: full.then(Vec::new),
            ..Self::default()
        }
    }

    /// Whether this is a full snapshot.
    pub fn is_full(&self) -> bool {
        self.object_changed
    }

    /// Add a track's control points (full snapshots only).
    pub fn push_track(&mut self, track: &Track) {
        let points = track.control_points().to_vec();
        match track.shape() {
            TrackShape::Straight(_) => self.straight_tracks.get_or_insert_with(Vec::new).push(points),
            TrackShape::Bezier(_) => self.bezier_tracks.get_or_insert_with(Vec::new).push(points),
            TrackShape::Switch(_) => {}
        }
    }

    /// Add a switch's online and offline routes and its direction.
    pub fn push_switch(&mut self, layout: &Layout, id: TrackId, switch: &Switch) {
        if let Some((curved, portion)) = TrackPortion::of(layout, switch.online()) {
            if curved {
                self.online_switch_bezier_tracks.push(portion);
            } else {
                self.online_switch_straight_tracks.push(portion);
            }
        }
        if let Some((curved, portion)) = TrackPortion::of(layout, switch.offline()) {
            if curved {
                self.offline_switch_bezier_tracks.push(portion);
            } else {
                self.offline_switch_straight_tracks.push(portion);
            }
        }
        self.switch_directions.push(SwitchState {
            id,
            direction: switch.direction(),
        });
    }
}

/// Train as reported in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainState {
    /// Train id.
    pub id: TrainId,
    /// Reversed flag.
    pub reversed: bool,
    /// Headlight.
    pub light: bool,
    /// Front wheel world position.
    pub front_wheel: Point2D,
    /// Back wheel world position.
    pub back_wheel: Point2D,
    /// Body length (full only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    /// Body width (full only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Wheel offset (full only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel_offset: Option<f64>,
}

impl TrainState {
    /// Describe `train`; `None` while it is not on the layout.
    pub fn of(train: &Train, full: bool) -> Option<Self> {
        let front = train.front_wheel()?;
        let back = train.back_wheel()?;
        let profile = train.profile();
        Some(Self {
            id: train.id(),
            reversed: train.is_reversed(),
            light: train.light(),
            front_wheel: front.position,
            back_wheel: back.position,
            length: full.then_some(profile.length),
            width: full.then_some(profile.width),
            wheel_offset: full.then_some(profile.wheel_offset),
        })
    }
}

/// A track attached to a switch, with the end touching the switch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPortion {
    /// Control points of the track.
    pub track: Vec<Point2D>,
    /// Whether the track's head touches the switch.
    pub head: bool,
}

impl TrackPortion {
    /// Portion for a switch route, tagged with whether it is curved.
    fn of(layout: &Layout, connection: Option<Connection>) -> Option<(bool, Self)> {
        let connection = connection?;
        let track = layout.get(connection.track)?;
        let curved = match track.shape() {
            TrackShape::Straight(_) => false,
            TrackShape::Bezier(_) => true,
            TrackShape::Switch(_) => return None,
        };
        Some((
            curved,
            Self {
                track: track.control_points().to_vec(),
                head: connection.head,
            },
        ))
    }
}

/// Direction of one switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchState {
    /// Switch id.
    pub id: TrackId,
    /// Current direction.
    pub direction: SwitchDirection,
}

/// Static description of a switch for labelling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchMetadata {
    /// Switch id.
    pub id: TrackId,
    /// Display name.
    pub name: String,
    /// Position.
    pub position: Point2D,
    /// Heading of the straight route leaving the switch, in radians.
    pub rotation: f64,
    /// Whether the curved route diverges to the right of the straight one.
    pub turning_right: bool,
    /// Current direction.
    pub direction: SwitchDirection,
}

impl SwitchMetadata {
    /// Describe switch `id`.
    pub fn describe(layout: &Layout, id: TrackId, switch: &Switch) -> Self {
        let position = switch.position();
        let heading = |direction| {
            switch
                .route(direction)
                .and_then(|c| layout.get(c.track))
                .and_then(|t| t.position_at(t.length() / 2.0).ok())
                .map(|p| (p - position).normalize())
        };
        let straight = heading(SwitchDirection::Straight);
        let curve = heading(SwitchDirection::Curve);
        Self {
            id,
            name: switch.name().to_string(),
            position,
            rotation: straight.map(Point2D::angle).unwrap_or(0.0),
            turning_right: match (straight, curve) {
                (Some(s), Some(c)) => s.cross(c) > 0.0,
                _ => false,
            },
            direction: switch.direction(),
        }
    }
}

/// Static description of a sensor for labelling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorMetadata {
    /// Sensor id.
    pub id: SensorId,
    /// Display name.
    pub name: String,
    /// Position on the layout.
    pub position: Point2D,
    /// Heading of the triggering direction of travel, in radians.
    pub rotation: f64,
}

impl SensorMetadata {
    /// Describe `sensor` mounted on `track`.
    pub fn describe(track: &Track, sensor: &Sensor) -> Self {
        let length = track.length();
        let offset = sensor.offset_on(length).clamp(0.0, length);
        let position = track.position_at(offset).unwrap_or_else(|_| track.start());
        let tangent = track.tangent_at(offset).unwrap_or(Point2D::ORIGIN);
        let heading = if sensor.forward { tangent } else { -tangent };
        Self {
            id: sensor.id,
            name: sensor.name.to_string(),
            position,
            rotation: heading.angle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_payload_omits_geometry() {
        let json = serde_json::to_value(TickPayload::new(5, false)).unwrap();
        assert_eq!(json["objectChanged"], false);
        assert!(json["straightTracks"].is_null());
        assert!(json["bezierTracks"].is_null());
        assert_eq!(json["onlineSwitchStraightTracks"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn full_payload_has_empty_geometry_lists() {
        let json = serde_json::to_value(TickPayload::new(5, true)).unwrap();
        assert_eq!(json["drawTrack"], true);
        assert_eq!(json["straightTracks"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn switch_metadata_turns_right() {
        let mut layout = Layout::new();
        layout.insert(Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(50.0, 0.0)));
        layout.insert(Track::straight(2, Point2D::new(50.0, 0.0), Point2D::new(100.0, 0.0)));
        // y grows downwards on screen, so +y is to the right of +x
        layout.insert(Track::straight(3, Point2D::new(50.0, 0.0), Point2D::new(90.0, 30.0)));
        layout.insert(Track::switch(9, Point2D::new(50.0, 0.0)));
        layout.connect_switch(9, 1, 2, 3).unwrap();

        let switch = layout.switch(9).unwrap();
        let meta = SwitchMetadata::describe(&layout, 9, switch);
        assert_eq!(meta.name, "9");
        assert!(meta.turning_right);
        assert!(meta.rotation.abs() < 1e-12);
    }

    #[test]
    fn sensor_metadata_faces_travel_direction() {
        let track = Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0));
        let sensor = Sensor::new(2, "A3", -25.0, false, 6.0);
        let meta = SensorMetadata::describe(&track, &sensor);
        assert_eq!(meta.position, Point2D::new(75.0, 0.0));
        assert!((meta.rotation.abs() - core::f64::consts::PI).abs() < 1e-12);
    }
}

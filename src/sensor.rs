//! Track-side contacts.
//!
//! A sensor is a point on a track that reports while the front wheel of a
//! train travelling in its direction is within half its trigger width.

use crate::config::{label, Label};

/// Sensor identifier, also its bit index in a sensor report.
pub type SensorId = u32;

/// A contact attached to one track.
#[derive(Clone, Debug, PartialEq)]
pub struct Sensor {
    /// Report index.
    pub id: SensorId,
    /// Display name, e.g. `C13`.
    pub name: Label,
    /// Offset from the track head; negative values count back from the tail.
    pub distance_to_head: f64,
    /// Direction of travel that triggers the sensor.
    pub forward: bool,
    /// Length of track around the sensor that triggers it.
    pub trigger_width: f64,
}

impl Sensor {
    /// Create a sensor.
    pub fn new(
        id: SensorId,
        name: &str,
        distance_to_head: f64,
        forward: bool,
        trigger_width: f64,
    ) -> Self {
        Self {
            id,
            name: label(name),
            distance_to_head,
            forward,
            trigger_width,
        }
    }

    /// Offset from the head on a track of `track_length`.
    pub fn offset_on(&self, track_length: f64) -> f64 {
        if self.distance_to_head < 0.0 {
            track_length + self.distance_to_head
        } else {
            self.distance_to_head
        }
    }

    /// Whether a wheel at `distance` travelling `forward` triggers this sensor.
    pub fn is_triggered(&self, track_length: f64, distance: f64, forward: bool) -> bool {
        self.forward == forward
            && (self.offset_on(track_length) - distance).abs() <= self.trigger_width / 2.0
    }
}

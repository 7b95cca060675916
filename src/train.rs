//! Train kinematics.
//!
//! A train is two coupled wheels on the track graph:
//!
//! - the **front** (active) wheel is driven directly by the current speed
//!   through [`Layout::advance`]
//! - the **back** (passive) wheel is dragged along by [`Layout::follow`],
//!   keeping `length - 2 * wheel_offset` between the two
//!
//! Speed changes are not instantaneous: [`Train::accelerate`] steps the
//! current speed by one notch every `accelerate_interval_ms` until it reaches
//! the target.
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::{
//!     config::TrainConfig, diagnostics::RecordingSink, geometry::Point2D,
//!     layout::Layout, track::Track, train::Train,
//! };
//!
//! let mut layout = Layout::new();
//! layout.insert(Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)));
//!
//! let mut train = Train::new(7, TrainConfig::default());
//! train.put_on_track(&layout, 1, true).unwrap();
//! train.set_target_speed(14);
//! train.accelerate(60_000.0);
//! assert_eq!(train.current_speed(), 14);
//!
//! let mut sink = RecordingSink::new();
//! train.advance(&layout, 100.0, &mut sink).unwrap();
//! assert!(train.is_position_dirty());
//! ```

use thiserror::Error;

use crate::config::TrainConfig;
use crate::diagnostics::DiagnosticSink;
use crate::layout::Layout;
use crate::sensor::Sensor;
use crate::track::{PositionOnTrack, TrackError, TrackId};

/// Train identifier as used on the wire.
pub type TrainId = u32;

/// A wheel's position on the layout.
pub type Wheel = PositionOnTrack;

/// Highest speed notch.
pub const MAX_SPEED: u8 = 14;

/// Why a train could not be moved.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MotionError {
    /// The train has not been put on a track.
    #[error("train {0} is not on the layout")]
    NotOnTrack(TrainId),

    /// The front wheel ran past a track end with no connection.
    #[error("train {train}: front wheel ran off track {track}")]
    FrontWheelRanOff {
        /// The train.
        train: TrainId,
        /// Track the wheel was on.
        track: TrackId,
    },

    /// No reachable track keeps the back wheel at the wheel spacing.
    #[error("train {train}: back wheel lost the front wheel on track {track}")]
    BackWheelRanOff {
        /// The train.
        train: TrainId,
        /// Track the wheel was on.
        track: TrackId,
    },

    /// A precondition failed while traversing the layout.
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// A train on the layout.
#[derive(Clone, Debug, PartialEq)]
pub struct Train {
    id: TrainId,
    profile: TrainConfig,
    target_speed: u8,
    current_speed: u8,
    next_accelerate: f64,
    reversed: bool,
    light: bool,
    front: Option<Wheel>,
    back: Option<Wheel>,
    position_dirty: bool,
    light_dirty: bool,
}

impl Train {
    /// A stopped train, not yet on the layout.
    pub fn new(id: TrainId, profile: TrainConfig) -> Self {
        Self {
            id,
            profile,
            target_speed: 0,
            current_speed: 0,
            next_accelerate: 0.0,
            reversed: false,
            light: false,
            front: None,
            back: None,
            position_dirty: false,
            light_dirty: false,
        }
    }

    /// Identifier.
    pub fn id(&self) -> TrainId {
        self.id
    }

    /// Physical constants.
    pub fn profile(&self) -> &TrainConfig {
        &self.profile
    }

    /// Distance kept between the wheels.
    pub fn wheel_spacing(&self) -> f64 {
        self.profile.wheel_spacing()
    }

    /// Commanded speed notch.
    pub fn target_speed(&self) -> u8 {
        self.target_speed
    }

    /// Speed notch currently driven.
    pub fn current_speed(&self) -> u8 {
        self.current_speed
    }

    /// Whether the train has been reversed an odd number of times.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Headlight state.
    pub fn light(&self) -> bool {
        self.light
    }

    /// Front (active) wheel.
    pub fn front_wheel(&self) -> Option<&Wheel> {
        self.front.as_ref()
    }

    /// Back (passive) wheel.
    pub fn back_wheel(&self) -> Option<&Wheel> {
        self.back.as_ref()
    }

    /// Whether the position changed since it was last reported.
    pub fn is_position_dirty(&self) -> bool {
        self.position_dirty
    }

    /// Whether the light changed since it was last reported.
    pub fn is_light_dirty(&self) -> bool {
        self.light_dirty
    }

    /// Clear both dirty flags, returning whether either was set.
    pub fn take_dirty(&mut self) -> bool {
        let dirty = self.position_dirty || self.light_dirty;
        self.position_dirty = false;
        self.light_dirty = false;
        dirty
    }

    /// Set the speed notch to ramp towards, capped at [`MAX_SPEED`].
    pub fn set_target_speed(&mut self, speed: u8) {
        self.target_speed = speed.min(MAX_SPEED);
    }

    /// Switch the headlight. Marks the light dirty only on an actual change.
    pub fn set_light(&mut self, light: bool) {
        if self.light != light {
            self.light_dirty = true;
        }
        self.light = light;
    }

    /// Place both wheels on `track`: the front wheel at its middle and the
    /// back wheel one wheel spacing behind, against the direction of travel.
    pub fn put_on_track(
        &mut self,
        layout: &Layout,
        track: TrackId,
        forward: bool,
    ) -> Result<(), TrackError> {
        let middle = layout.track(track)?.length() / 2.0;
        let sign = if forward { -1.0 } else { 1.0 };
        let behind = sign * self.wheel_spacing();
        let front = layout.place(track, middle, forward)?;
        let back = layout.place(track, middle + behind, forward)?;
        self.front = Some(front);
        self.back = Some(back);
        self.position_dirty = true;
        Ok(())
    }

    /// Ramp the current speed towards the target over `interval_ms`.
    pub fn accelerate(&mut self, interval_ms: f64) {
        if self.target_speed == self.current_speed {
            return;
        }
        self.next_accelerate -= interval_ms;
        while self.next_accelerate < 0.0 && self.target_speed != self.current_speed {
            if self.target_speed > self.current_speed {
                self.current_speed += 1;
            } else {
                self.current_speed -= 1;
            }
            if self.target_speed == self.current_speed {
                self.next_accelerate = 0.0;
            } else {
                self.next_accelerate += self.profile.accelerate_interval_ms;
            }
        }
    }

    /// Distance the front wheel covers in `interval_ms` at the current speed.
    pub fn displacement(&self, interval_ms: f64) -> f64 {
        self.current_speed as f64 * self.profile.speed_multiplier * interval_ms / 1000.0
    }

    /// Move the train for `interval_ms` at its current speed.
    ///
    /// Both wheels are resolved before either is committed: on error the
    /// train stays exactly where it was. A stopped train is left untouched.
    pub fn advance(
        &mut self,
        layout: &Layout,
        interval_ms: f64,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), MotionError> {
        if self.current_speed == 0 {
            return Ok(());
        }
        let (Some(front), Some(back)) = (self.front.as_ref(), self.back.as_ref()) else {
            return Err(MotionError::NotOnTrack(self.id));
        };

        let new_front = layout
            .advance(front, self.displacement(interval_ms))?
            .ok_or(MotionError::FrontWheelRanOff {
                train: self.id,
                track: front.track,
            })?;
        let new_back = layout
            .follow(back, new_front.position, self.wheel_spacing(), sink)?
            .ok_or(MotionError::BackWheelRanOff {
                train: self.id,
                track: back.track,
            })?;

        self.front = Some(new_front);
        self.back = Some(new_back);
        self.position_dirty = true;
        Ok(())
    }

    /// Turn the train around: both wheels flip their direction of travel and
    /// the train stops.
    pub fn reverse(&mut self) {
        self.reversed = !self.reversed;
        for wheel in [self.front.as_mut(), self.back.as_mut()].into_iter().flatten() {
            wheel.forward = !wheel.forward;
        }
        self.halt();
    }

    /// Stop immediately, without ramping down.
    pub fn halt(&mut self) {
        self.current_speed = 0;
        self.target_speed = 0;
        self.next_accelerate = 0.0;
    }

    /// Sensors under the front wheel.
    pub fn triggered_sensors<'a>(&self, layout: &'a Layout) -> Vec<&'a Sensor> {
        let Some(front) = self.front.as_ref() else {
            return Vec::new();
        };
        layout
            .get(front.track)
            .map(|track| track.sensors_at(front.distance, front.forward).collect())
            .unwrap_or_default()
    }
}

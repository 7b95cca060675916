//! Commands accepted by the [`Controller`](crate::Controller).
//!
//! Commands are what the [`Decoder`](crate::decoder::Decoder) produces from
//! the wire, but they can also be built directly (tests, scripted demos).
//!
//! | Command | Effect | Unknown id |
//! |---------|--------|------------|
//! | [`Command::SetSpeed`] | new target speed and light | rejected, diagnostic |
//! | [`Command::Reverse`] | flip direction, stop | rejected, diagnostic |
//! | [`Command::SetSwitch`] | change switch direction | rejected, diagnostic |
//! | [`Command::RequestSensorReport`] | snapshot of every sensor | - |
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::{Command, CommandOutcome, Controller, RejectReason};
//!
//! let mut controller = Controller::default();
//! let outcome = controller.apply_command(Command::Reverse(3));
//! assert_eq!(
//!     outcome,
//!     CommandOutcome::Rejected { reason: RejectReason::UnknownTrain(3) }
//! );
//! ```

use crate::decoder::encode_sensors;
use crate::sensor::SensorId;
use crate::track::{SwitchDirection, TrackId};
use crate::train::TrainId;

/// A control command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Set a train's target speed notch and headlight.
    SetSpeed {
        /// Train addressed.
        train: TrainId,
        /// Target notch (0-14).
        speed: u8,
        /// Headlight on.
        light: bool,
    },

    /// Reverse a train's direction of travel. The train stops.
    Reverse(TrainId),

    /// Set a switch.
    SetSwitch {
        /// Switch addressed.
        switch: TrackId,
        /// New direction.
        direction: SwitchDirection,
    },

    /// Sample every sensor.
    RequestSensorReport,
}

/// What applying a command did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// State changed.
    Applied,

    /// The command was valid but changed nothing (switch already set).
    Unchanged,

    /// The command addressed something that does not exist.
    Rejected {
        /// Why.
        reason: RejectReason,
    },

    /// Sensor states at the time of the request. Delivery latency is up to
    /// the caller.
    SensorReport(SensorReport),
}

/// Reason a command was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// No train with this id.
    UnknownTrain(TrainId),
    /// No switch with this id.
    UnknownSwitch(TrackId),
}

/// State of every sensor, indexed by [`SensorId`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SensorReport {
    /// `states[id]` is true while sensor `id` is covered.
    pub states: Vec<bool>,
}

impl SensorReport {
    /// Number of sensors reported.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the report covers no sensors.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether sensor `id` is triggered (false when out of range).
    pub fn is_triggered(&self, id: SensorId) -> bool {
        self.states.get(id as usize).copied().unwrap_or(false)
    }

    /// Ids of triggered sensors, ascending.
    pub fn triggered(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(id, _)| id as SensorId)
    }

    /// Wire encoding, MSB first.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_sensors(&self.states)
    }
}

//! The simulation controller.
//!
//! [`Controller`] owns the [`Layout`] and every [`Train`]. It is the only
//! thing that mutates simulation state: commands go through
//! [`Controller::apply_command`] (or the individual setters) and time moves
//! forward only through [`Controller::tick`].
//!
//! ```text
//!   bytes ──► Decoder ──► apply_command ──► Train / Switch state
//!                                                  │
//!   timer ──► tick(interval) ──► accelerate + advance every train
//!                                                  │
//!   consumer ◄── get_tick(delta) ◄── dirty flags ──┘
//! ```
//!
//! Recoverable anomalies (duplicate ids, unknown ids, unsafe switch
//! traversal) go to the [`DiagnosticSink`] the controller was built with.
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::{
//!     config::TrainConfig, diagnostics::RecordingSink, geometry::Point2D,
//!     track::Track, train::Train, Controller,
//! };
//!
//! let mut controller = Controller::with_sink(RecordingSink::new());
//! controller.register_track(Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)));
//!
//! let mut train = Train::new(24, TrainConfig::default());
//! train.put_on_track(controller.layout(), 1, true).unwrap();
//! controller.register_train(train);
//!
//! controller.set_train_speed(24, 8, true);
//! controller.tick(1000.0 / 120.0).unwrap();
//!
//! let full = controller.get_tick(false);
//! assert_eq!(full.trains.len(), 1);
//! ```

use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;

use crate::commands::{Command, CommandOutcome, RejectReason, SensorReport};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::layout::Layout;
use crate::sensor::SensorId;
use crate::snapshot::{SensorMetadata, SwitchMetadata, TickPayload, TrainState};
use crate::track::{SwitchDirection, Track, TrackId};
use crate::train::{MotionError, Train, TrainId};

/// Trains that could not be advanced during a tick.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TickError {
    /// One entry per train that stopped resolving, in train order.
    #[error("{} train(s) could not be advanced", .0.len())]
    Motion(Vec<MotionError>),
}

/// Owner of the layout, the trains and the tick.
#[derive(Debug)]
pub struct Controller<D: DiagnosticSink = TracingSink> {
    layout: Layout,
    trains: Vec<Train>,
    sink: D,
    launched: Instant,
    sensors: Option<SensorIndex>,
}

/// Which track carries each sensor id.
#[derive(Debug, Default)]
struct SensorIndex {
    owners: HashMap<SensorId, TrackId>,
    count: usize,
}

impl SensorIndex {
    fn of(layout: &Layout) -> Self {
        let mut index = Self::default();
        for track in layout.tracks() {
            index.record(track);
        }
        index
    }

    fn record(&mut self, track: &Track) {
        for sensor in track.sensors() {
            self.owners.entry(sensor.id).or_insert(track.id());
            self.count = self.count.max(sensor.id as usize + 1);
        }
    }
}

impl Default for Controller<TracingSink> {
    fn default() -> Self {
        Self::with_sink(TracingSink)
    }
}

impl Controller<TracingSink> {
    /// Controller reporting diagnostics through `tracing`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: DiagnosticSink> Controller<D> {
    /// Empty controller reporting diagnostics to `sink`.
    pub fn with_sink(sink: D) -> Self {
        Self {
            layout: Layout::new(),
            trains: Vec::new(),
            sink,
            launched: Instant::now(),
            sensors: None,
        }
    }

    /// Replace the layout wholesale.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self.sensors = None;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The track graph.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Mutable track graph, for connecting tracks after registration.
    pub fn layout_mut(&mut self) -> &mut Layout {
        self.sensors = None;
        &mut self.layout
    }

    /// Diagnostic sink.
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Mutable diagnostic sink.
    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }

    /// Trains in registration order.
    pub fn trains(&self) -> impl Iterator<Item = &Train> + '_ {
        self.trains.iter()
    }

    /// Train by id.
    pub fn train(&self, id: TrainId) -> Option<&Train> {
        self.trains.iter().find(|t| t.id() == id)
    }

    fn train_mut(&mut self, id: TrainId) -> Option<&mut Train> {
        self.trains.iter_mut().find(|t| t.id() == id)
    }

    /// Milliseconds since the controller was created.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.launched.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Add a train. A train with the same id is replaced in place.
    pub fn register_train(&mut self, train: Train) {
        let id = train.id();
        match self.trains.iter_mut().find(|t| t.id() == id) {
            Some(existing) => {
                *existing = train;
                self.sink.emit(Diagnostic::DuplicateTrain(id));
            }
            None => self.trains.push(train),
        }
    }

    /// Add a track (or switch). A track with the same id is replaced.
    pub fn register_track(&mut self, track: Track) {
        let id = track.id();
        let index = self
            .sensors
            .get_or_insert_with(|| SensorIndex::of(&self.layout));
        for sensor in track.sensors() {
            if index.owners.get(&sensor.id).is_some_and(|&owner| owner != id) {
                self.sink.emit(Diagnostic::DuplicateSensor(sensor.id));
            }
        }
        index.record(&track);
        if self.layout.insert(track).is_some() {
            // the replaced track's sensors may still be indexed
            self.sensors = None;
            self.sink.emit(Diagnostic::DuplicateTrack(id));
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Apply one command.
    pub fn apply_command(&mut self, command: Command) -> CommandOutcome {
        match command {
            Command::SetSpeed {
                train,
                speed,
                light,
            } => self.set_train_speed(train, speed, light),
            Command::Reverse(train) => self.reverse_train(train),
            Command::SetSwitch { switch, direction } => {
                self.change_switch_direction(switch, direction)
            }
            Command::RequestSensorReport => {
                CommandOutcome::SensorReport(self.request_sensor_report())
            }
        }
    }

    /// Set a train's target speed and headlight.
    pub fn set_train_speed(&mut self, id: TrainId, speed: u8, light: bool) -> CommandOutcome {
        let Some(train) = self.train_mut(id) else {
            return self.reject(RejectReason::UnknownTrain(id));
        };
        train.set_target_speed(speed);
        train.set_light(light);
        CommandOutcome::Applied
    }

    /// Reverse a train.
    pub fn reverse_train(&mut self, id: TrainId) -> CommandOutcome {
        let Some(train) = self.train_mut(id) else {
            return self.reject(RejectReason::UnknownTrain(id));
        };
        train.reverse();
        CommandOutcome::Applied
    }

    /// Set a switch.
    pub fn change_switch_direction(
        &mut self,
        id: TrackId,
        direction: SwitchDirection,
    ) -> CommandOutcome {
        let Ok(switch) = self.layout.switch_mut(id) else {
            return self.reject(RejectReason::UnknownSwitch(id));
        };
        if switch.change_direction(direction) {
            CommandOutcome::Applied
        } else {
            CommandOutcome::Unchanged
        }
    }

    fn reject(&mut self, reason: RejectReason) -> CommandOutcome {
        let diagnostic = match reason {
            RejectReason::UnknownTrain(id) => Diagnostic::UnknownTrain(id),
            RejectReason::UnknownSwitch(id) => Diagnostic::UnknownSwitch(id),
        };
        self.sink.emit(diagnostic);
        CommandOutcome::Rejected { reason }
    }

    // ========================================================================
    // Sensors
    // ========================================================================

    /// One more than the largest sensor id on the layout. Computed on first
    /// use and cached until the layout changes.
    pub fn sensor_count(&mut self) -> usize {
        self.sensors
            .get_or_insert_with(|| SensorIndex::of(&self.layout))
            .count
    }

    /// Sample every sensor against the current front-wheel positions.
    pub fn request_sensor_report(&mut self) -> SensorReport {
        let mut states = vec![false; self.sensor_count()];
        for train in &self.trains {
            for sensor in train.triggered_sensors(&self.layout) {
                if let Some(state) = states.get_mut(sensor.id as usize) {
                    *state = true;
                }
            }
        }
        SensorReport { states }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance every train by `interval_ms`, in registration order.
    ///
    /// A train that cannot be resolved stays where it was, is halted and
    /// emits [`Diagnostic::Derailed`]; the other trains still move. All
    /// failures are returned together.
    pub fn tick(&mut self, interval_ms: f64) -> Result<(), TickError> {
        let mut failures = Vec::new();
        for train in &mut self.trains {
            train.accelerate(interval_ms);
            if let Err(err) = train.advance(&self.layout, interval_ms, &mut self.sink) {
                self.sink.emit(Diagnostic::Derailed {
                    train: train.id(),
                    reason: err.to_string(),
                });
                train.halt();
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TickError::Motion(failures))
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Build a snapshot.
    ///
    /// A delta snapshot includes only trains whose position or light changed
    /// and switches whose direction changed since the last snapshot. Both
    /// kinds clear the dirty flags of everything they include.
    pub fn get_tick(&mut self, delta: bool) -> TickPayload {
        let full = !delta;
        let mut payload = TickPayload::new(self.elapsed_ms(), full);

        for train in &mut self.trains {
            if full || train.is_position_dirty() || train.is_light_dirty() {
                if let Some(state) = TrainState::of(train, full) {
                    payload.trains.push(state);
                }
                train.take_dirty();
            }
        }

        if full {
            for track in self.layout.tracks() {
                payload.push_track(track);
            }
        }

        for id in self.layout.switch_ids() {
            let Ok(switch) = self.layout.switch(id) else {
                continue;
            };
            if !full && !switch.is_direction_dirty() {
                continue;
            }
            payload.push_switch(&self.layout, id, switch);
            if full {
                payload
                    .switches
                    .push(SwitchMetadata::describe(&self.layout, id, switch));
            }
            if let Ok(switch) = self.layout.switch_mut(id) {
                switch.take_direction_dirty();
            }
        }

        if full {
            for track in self.layout.tracks() {
                for sensor in track.sensors() {
                    payload.sensors.push(SensorMetadata::describe(track, sensor));
                }
            }
        }

        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainConfig;
    use crate::diagnostics::RecordingSink;
    use crate::geometry::Point2D;
    use crate::sensor::Sensor;

    fn controller() -> Controller<RecordingSink> {
        let mut controller = Controller::with_sink(RecordingSink::new());
        controller.register_track(
            Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0))
                .with_sensor(Sensor::new(3, "A4", 50.0, true, 6.0)),
        );
        let mut train = Train::new(24, TrainConfig::default());
        train.put_on_track(controller.layout(), 1, true).unwrap();
        controller.register_train(train);
        controller.sink_mut().drain();
        controller
    }

    #[test]
    fn duplicate_registration_is_reported() {
        let mut controller = controller();
        controller.register_train(Train::new(24, TrainConfig::default()));
        controller.register_track(Track::straight(1, Point2D::ORIGIN, Point2D::new(1.0, 0.0)));
        assert_eq!(controller.trains().count(), 1);
        assert_eq!(controller.layout().track(1).unwrap().length(), 1.0);
        assert_eq!(
            controller.sink_mut().drain(),
            vec![Diagnostic::DuplicateTrain(24), Diagnostic::DuplicateTrack(1)]
        );
    }

    #[test]
    fn duplicate_sensor_is_reported() {
        let mut controller = controller();
        controller.register_track(
            Track::straight(2, Point2D::new(100.0, 0.0), Point2D::new(200.0, 0.0))
                .with_sensor(Sensor::new(3, "A4", 10.0, true, 6.0)),
        );
        assert!(controller.sink().contains(&Diagnostic::DuplicateSensor(3)));
    }

    #[test]
    fn duplicate_train_is_replaced_in_place() {
        let mut controller = controller();
        controller.register_train(Train::new(7, TrainConfig::default()));
        let replacement = TrainConfig::default().with_body(30.0, 3.5, 4.9);
        controller.register_train(Train::new(24, replacement));

        let ids: Vec<_> = controller.trains().map(Train::id).collect();
        assert_eq!(ids, vec![24, 7]);
        assert_eq!(controller.train(24).unwrap().profile().length, 30.0);
        assert!(controller.train(24).unwrap().front_wheel().is_none());
        assert_eq!(
            controller.sink_mut().drain(),
            vec![Diagnostic::DuplicateTrain(24)]
        );
    }

    #[test]
    fn replacing_a_track_keeps_its_own_sensor() {
        let mut controller = controller();
        controller.register_track(
            Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0))
                .with_sensor(Sensor::new(3, "A4", 20.0, true, 6.0)),
        );
        assert!(!controller.sink().contains(&Diagnostic::DuplicateSensor(3)));

        // the replaced track's sensor no longer blocks its id
        controller.register_track(Track::straight(1, Point2D::ORIGIN, Point2D::new(1.0, 0.0)));
        controller.register_track(
            Track::straight(2, Point2D::new(100.0, 0.0), Point2D::new(200.0, 0.0))
                .with_sensor(Sensor::new(3, "A4", 10.0, true, 6.0)),
        );
        assert!(!controller.sink().contains(&Diagnostic::DuplicateSensor(3)));
    }

    #[test]
    fn sensor_count_follows_registration() {
        let mut controller = controller();
        assert_eq!(controller.sensor_count(), 4);
        controller.register_track(
            Track::straight(2, Point2D::new(100.0, 0.0), Point2D::new(200.0, 0.0))
                .with_sensor(Sensor::new(9, "A10", 10.0, true, 6.0)),
        );
        assert_eq!(controller.sensor_count(), 10);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut controller = controller();
        assert_eq!(
            controller.set_train_speed(99, 5, false),
            CommandOutcome::Rejected {
                reason: RejectReason::UnknownTrain(99)
            }
        );
        assert_eq!(
            controller.change_switch_direction(1, SwitchDirection::Curve),
            CommandOutcome::Rejected {
                reason: RejectReason::UnknownSwitch(1)
            }
        );
        assert_eq!(
            controller.sink_mut().drain(),
            vec![Diagnostic::UnknownTrain(99), Diagnostic::UnknownSwitch(1)]
        );
    }

    #[test]
    fn sensor_report_sees_front_wheel() {
        let mut controller = controller();
        assert_eq!(controller.sensor_count(), 4);
        let report = controller.request_sensor_report();
        assert_eq!(report.states, vec![false, false, false, true]);

        controller.reverse_train(24);
        assert!(!controller.request_sensor_report().is_triggered(3));
    }

    #[test]
    fn light_change_marks_dirty_once() {
        let mut controller = controller();
        controller.get_tick(true);

        controller.set_train_speed(24, 0, true);
        assert_eq!(controller.get_tick(true).trains.len(), 1);
        controller.set_train_speed(24, 0, true);
        assert!(controller.get_tick(true).trains.is_empty());
    }

    #[test]
    fn tick_moves_in_registration_order() {
        let mut controller = controller();
        let mut second = Train::new(2, TrainConfig::default());
        second.put_on_track(controller.layout(), 1, false).unwrap();
        controller.register_train(second);

        let ids: Vec<_> = controller.trains().map(Train::id).collect();
        assert_eq!(ids, vec![24, 2]);

        controller.set_train_speed(24, 14, false);
        let before = controller.train(24).unwrap().front_wheel().copied();
        assert!(matches!(controller.tick(1e6), Err(TickError::Motion(ref e)) if e.len() == 1));
        assert!(matches!(
            controller.sink().events.last(),
            Some(Diagnostic::Derailed { train: 24, .. })
        ));

        let train = controller.train(24).unwrap();
        assert_eq!(train.front_wheel().copied(), before);
        assert_eq!(train.current_speed(), 0);
        assert!(controller.tick(1000.0).is_ok());
    }
}

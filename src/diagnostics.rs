//! Structured diagnostics for recoverable anomalies.
//!
//! The simulator never aborts on a duplicate registration, an unknown id in a
//! command or a passive wheel dragged through a switch set for the other
//! route. Instead it emits a [`Diagnostic`] to the [`DiagnosticSink`] chosen
//! when the [`Controller`](crate::Controller) is built.
//!
//! | Sink | Purpose |
//! |------|---------|
//! | [`TracingSink`] | Production: forwards to `tracing` |
//! | [`RecordingSink`] | Tests: keeps every diagnostic for assertions |
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::diagnostics::{Diagnostic, DiagnosticSink, RecordingSink};
//!
//! let mut sink = RecordingSink::new();
//! sink.emit(Diagnostic::UnknownTrain(7));
//! assert!(sink.contains(&Diagnostic::UnknownTrain(7)));
//! ```

use crate::sensor::SensorId;
use crate::track::TrackId;
use crate::train::TrainId;

/// A recoverable anomaly observed by the simulation core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A train id was registered twice; the later train replaced the earlier.
    DuplicateTrain(TrainId),
    /// A track id was registered twice; the later track replaced the earlier.
    DuplicateTrack(TrackId),
    /// Two sensors share an id.
    DuplicateSensor(SensorId),
    /// A command referenced a train that is not registered.
    UnknownTrain(TrainId),
    /// A command referenced a switch that is not registered.
    UnknownSwitch(TrackId),
    /// A passive wheel was dragged through a switch from its offline branch.
    UnsafeSwitch {
        /// The switch traversed.
        switch: TrackId,
        /// The offline neighbor the wheel came from.
        from: TrackId,
    },
    /// The reserved train code `0x1F` was received.
    InvalidCode {
        /// First byte of the command.
        first: u8,
        /// Second byte of the command.
        second: u8,
    },
    /// A train could not be advanced this tick.
    Derailed {
        /// The train that stopped resolving.
        train: TrainId,
        /// Rendered [`MotionError`](crate::train::MotionError).
        reason: String,
    },
}

/// Receiver of [`Diagnostic`]s.
pub trait DiagnosticSink {
    /// Record or report a diagnostic.
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Sink forwarding every diagnostic to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::DuplicateTrain(id) => tracing::warn!(train = id, "adding duplicate train"),
            Diagnostic::DuplicateTrack(id) => tracing::warn!(track = id, "adding duplicate track"),
            Diagnostic::DuplicateSensor(id) => {
                tracing::warn!(sensor = id, "sensor id used more than once")
            }
            Diagnostic::UnknownTrain(id) => {
                tracing::warn!(train = id, "command for a train that is not on the layout")
            }
            Diagnostic::UnknownSwitch(id) => {
                tracing::warn!(switch = id, "command for a switch that is not on the layout")
            }
            Diagnostic::UnsafeSwitch { switch, from } => {
                tracing::warn!(switch, from, "unsafe switch position")
            }
            Diagnostic::InvalidCode { first, second } => {
                tracing::warn!(first, second, "invalid train code")
            }
            Diagnostic::Derailed { train, reason } => {
                tracing::error!(train, %reason, "train ran off the layout")
            }
        }
    }
}

/// Sink that keeps every diagnostic in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    /// Diagnostics in emission order.
    pub events: Vec<Diagnostic>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `diagnostic` was emitted at least once.
    pub fn contains(&self, diagnostic: &Diagnostic) -> bool {
        self.events.contains(diagnostic)
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        core::mem::take(&mut self.events)
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.events.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.emit(Diagnostic::DuplicateTrack(3));
        sink.emit(Diagnostic::UnknownSwitch(9));
        assert_eq!(
            sink.events,
            vec![Diagnostic::DuplicateTrack(3), Diagnostic::UnknownSwitch(9)]
        );
    }

    #[test]
    fn drain_empties_recorder() {
        let mut sink = RecordingSink::new();
        sink.emit(Diagnostic::UnknownTrain(1));
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn tracing_sink_accepts_everything() {
        let mut sink = TracingSink;
        sink.emit(Diagnostic::InvalidCode {
            first: 0x1F,
            second: 2,
        });
        sink.emit(Diagnostic::Derailed {
            train: 1,
            reason: "front wheel ran off track 4".into(),
        });
    }
}

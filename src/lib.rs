//! # marklin-sim
//!
//! A model railway simulator that speaks the Marklin 6051 serial protocol.
//!
//! Trains run on a graph of straight, curved and switch tracks. Each train is
//! two coupled wheels: the front wheel is driven by the commanded speed and
//! the back wheel is dragged along so the two stay one wheel spacing apart.
//! Sensors along the track report which contacts are covered.
//!
//! ## Features
//!
//! - **Track graph**: arena of tracks linked by `(id, head)` pairs, with
//!   endpoint-checked connections and switches that swap routes in place
//! - **Exact geometry**: arc-length parametrised Bezier curves, circle-line
//!   intersection on straights
//! - **Protocol decoder**: explicit two-byte state machine, robust to split
//!   reads, plus MSB-first sensor bit packing
//! - **Delta snapshots**: per-entity dirty flags drained into full or delta
//!   payloads for renderers
//! - **Structured diagnostics**: recoverable anomalies go to a pluggable sink
//!   instead of a console
//!
//! ## Architecture
//!
//! - `geometry` - points and cubic Bezier math
//! - `track` - track shapes, switches and per-track solving
//! - `layout` - the track arena and cross-track movement
//! - `train` - two-wheel kinematics and acceleration
//! - `controller` - owner of all state, tick and snapshots
//! - `decoder` - wire protocol to [`Command`]s
//! - `services` - tokio protocol listener and axum snapshot API
//!
//! ## Example
//!
//! ```rust
//! use marklin_sim::{
//!     config::TrainConfig, factory, train::Train, Command, CommandOutcome, Controller,
//! };
//!
//! let mut controller = Controller::default();
//! controller.register_track(factory::straight(1, 0.0, 0.0, 100.0, 0.0));
//! controller.register_track(factory::quadrant(2, 100.0, 0.0, 150.0, 50.0));
//! controller.layout_mut().connect_auto(1, 2).unwrap();
//!
//! let mut train = Train::new(24, TrainConfig::default());
//! train.put_on_track(controller.layout(), 1, true).unwrap();
//! controller.register_train(train);
//!
//! let outcome = controller.apply_command(Command::SetSpeed { train: 24, speed: 14, light: true });
//! assert_eq!(outcome, CommandOutcome::Applied);
//!
//! // Run one simulated second
//! for _ in 0..120 {
//!     controller.tick(1000.0 / 120.0).unwrap();
//! }
//! let delta = controller.get_tick(true);
//! assert_eq!(delta.trains.len(), 1);
//! ```

#![warn(missing_docs)]

/// Simulation, train and server configuration.
pub mod config;
/// Points and cubic Bezier curves.
pub mod geometry;
/// Structured reporting of recoverable anomalies.
pub mod diagnostics;
/// Track-side contacts.
pub mod sensor;
/// Track shapes, switches and connections.
pub mod track;
/// The track arena and movement across it.
pub mod layout;
/// Two-wheel train kinematics.
pub mod train;
/// Commands accepted by the controller.
pub mod commands;
/// Wire protocol decoder and sensor packing.
pub mod decoder;
/// Snapshot payloads.
pub mod snapshot;
/// The simulation controller.
pub mod controller;
/// Shorthand layout constructors.
pub mod factory;

/// Protocol listener and web snapshot API (feature-gated).
#[cfg(feature = "server")]
pub mod services;

// Re-exports for convenience
pub use commands::{Command, CommandOutcome, RejectReason, SensorReport};
pub use config::Config;
pub use controller::{Controller, TickError};
pub use decoder::{Decoded, Decoder};
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingSink, TracingSink};
pub use geometry::{CubicBezier, Point2D};
pub use layout::Layout;
pub use snapshot::TickPayload;
pub use track::{Connection, SwitchDirection, Track, TrackError, TrackId};
pub use train::{MotionError, Train, TrainId};

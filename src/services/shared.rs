//! Single-owner simulation task.
//!
//! The [`Controller`] lives inside one tokio task. Every other service talks
//! to it through a cloneable [`SimulationHandle`], so commands, the fixed
//! tick and snapshots are serialized without a lock around the controller.
//!
//! ```text
//!  protocol client ──Bytes──►┐
//!  web handler ──Snapshot───►├─ mpsc ─► Simulation::run ──► Controller
//!  report timer ──Deliver───►┘                │
//!                                             └── report bytes ──► client
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (simulation, handle) = Simulation::new(controller, &config);
//! tokio::spawn(simulation.run());
//!
//! let full = handle.snapshot(false).await?;
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::commands::SensorReport;
use crate::config::Config;
use crate::controller::{Controller, TickError};
use crate::decoder::Decoder;
use crate::diagnostics::DiagnosticSink;
use crate::snapshot::TickPayload;

/// Requests queued to the simulation task.
const REQUEST_CAPACITY: usize = 64;

/// Errors from talking to the simulation task.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The simulation task has exited.
    #[error("simulation task stopped")]
    SimulationStopped,

    /// Socket error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Requests
// ============================================================================

/// Message to the simulation task.
#[derive(Debug)]
pub enum Request {
    /// Raw protocol bytes from the connected client.
    Bytes(Vec<u8>),

    /// A protocol client connected; report bytes go to `output`.
    Connected {
        /// Channel to the client's writer.
        output: mpsc::Sender<Vec<u8>>,
    },

    /// The protocol client went away.
    Disconnected,

    /// Build a snapshot.
    Snapshot {
        /// Delta rather than full.
        delta: bool,
        /// Where to send it.
        reply: oneshot::Sender<TickPayload>,
    },

    /// A delayed sensor report is due.
    DeliverReport(SensorReport),
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable access to the simulation task.
#[derive(Clone, Debug)]
pub struct SimulationHandle {
    requests: mpsc::Sender<Request>,
}

impl SimulationHandle {
    /// Send protocol bytes for decoding.
    pub async fn feed(&self, bytes: Vec<u8>) -> Result<(), ServiceError> {
        self.send(Request::Bytes(bytes)).await
    }

    /// Register the protocol client's output channel.
    pub async fn attach_client(&self, output: mpsc::Sender<Vec<u8>>) -> Result<(), ServiceError> {
        self.send(Request::Connected { output }).await
    }

    /// Forget the protocol client.
    pub async fn detach_client(&self) -> Result<(), ServiceError> {
        self.send(Request::Disconnected).await
    }

    /// Request a full (`delta == false`) or delta snapshot.
    pub async fn snapshot(&self, delta: bool) -> Result<TickPayload, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Request::Snapshot { delta, reply }).await?;
        response.await.map_err(|_| ServiceError::SimulationStopped)
    }

    async fn send(&self, request: Request) -> Result<(), ServiceError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| ServiceError::SimulationStopped)
    }
}

// ============================================================================
// Simulation Task
// ============================================================================

/// The task owning the controller.
pub struct Simulation<D: DiagnosticSink> {
    controller: Controller<D>,
    decoder: Decoder,
    client: Option<mpsc::Sender<Vec<u8>>>,
    requests: mpsc::Receiver<Request>,
    loopback: mpsc::WeakSender<Request>,
    tick_interval: Duration,
    report_delay: Duration,
}

impl<D: DiagnosticSink + Send + 'static> Simulation<D> {
    /// Wrap `controller`; tick rate and report delay come from `config`.
    pub fn new(controller: Controller<D>, config: &Config) -> (Self, SimulationHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
        let tick_interval = Duration::from_secs_f64(config.simulation.tick_interval_ms() / 1000.0);
        let simulation = Self {
            controller,
            decoder: Decoder::new(),
            client: None,
            requests: rx,
            loopback: tx.downgrade(),
            tick_interval,
            report_delay: Duration::from_millis(config.sensor.report_delay_ms),
        };
        let handle = SimulationHandle {
            requests: tx,
        };
        (simulation, handle)
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let interval_ms = self.tick_interval.as_secs_f64() * 1000.0;
        info!(
            tick_ms = interval_ms,
            trains = self.controller.trains().count(),
            tracks = self.controller.layout().len(),
            "simulation started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(TickError::Motion(failures)) = self.controller.tick(interval_ms) {
                        debug!(count = failures.len(), "trains halted this tick");
                    }
                }
                request = self.requests.recv() => {
                    match request {
                        Some(request) => self.handle(request),
                        None => break,
                    }
                }
            }
        }
        info!("simulation stopped");
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Bytes(bytes) => {
                for report in self.decoder.drive(&mut self.controller, &bytes) {
                    self.schedule_report(report);
                }
            }
            Request::Connected { output } => {
                self.decoder.reset();
                self.client = Some(output);
            }
            Request::Disconnected => {
                self.decoder.reset();
                self.client = None;
            }
            Request::Snapshot { delta, reply } => {
                let _ = reply.send(self.controller.get_tick(delta));
            }
            Request::DeliverReport(report) => {
                let Some(client) = self.client.as_ref() else {
                    debug!("sensor report dropped, no client");
                    return;
                };
                if client.try_send(report.to_bytes()).is_err() {
                    warn!("client not keeping up, sensor report dropped");
                }
            }
        }
    }

    /// Send the report back to ourselves once the debounce delay passes.
    fn schedule_report(&self, report: SensorReport) {
        let Some(loopback) = self.loopback.upgrade() else {
            return;
        };
        let delay = self.report_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = loopback.send(Request::DeliverReport(report)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainConfig;
    use crate::diagnostics::RecordingSink;
    use crate::geometry::Point2D;
    use crate::sensor::Sensor;
    use crate::track::Track;
    use crate::train::Train;

    fn spawn_simulation() -> SimulationHandle {
        let mut controller = Controller::with_sink(RecordingSink::new());
        controller.register_track(
            Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0))
                .with_sensor(Sensor::new(0, "A1", 50.0, true, 6.0)),
        );
        let mut train = Train::new(24, TrainConfig::default());
        train.put_on_track(controller.layout(), 1, true).unwrap();
        controller.register_train(train);

        let (simulation, handle) = Simulation::new(controller, &Config::default());
        tokio::spawn(simulation.run());
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_round_trip() {
        let handle = spawn_simulation();
        let full = handle.snapshot(false).await.unwrap();
        assert!(full.is_full());
        assert_eq!(full.trains.len(), 1);

        let delta = handle.snapshot(true).await.unwrap();
        assert!(delta.trains.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_report_is_delayed() {
        let handle = spawn_simulation();
        let (output, mut reports) = mpsc::channel(4);
        handle.attach_client(output).await.unwrap();
        handle.feed(vec![0x85]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(reports.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(reports.recv().await, Some(vec![0x80]));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_reports_are_each_delivered() {
        let handle = spawn_simulation();
        let (output, mut reports) = mpsc::channel(4);
        handle.attach_client(output).await.unwrap();
        handle.feed(vec![0x85]).await.unwrap();

        // reversed, the front wheel no longer triggers the forward sensor
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.feed(vec![0x0F, 24, 0x85]).await.unwrap();

        assert_eq!(reports.recv().await, Some(vec![0x80]));
        assert_eq!(reports.recv().await, Some(vec![0x00]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(reports.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn report_dropped_after_disconnect() {
        let handle = spawn_simulation();
        let (output, mut reports) = mpsc::channel(4);
        handle.attach_client(output).await.unwrap();
        handle.feed(vec![0x85]).await.unwrap();
        handle.detach_client().await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(reports.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_reach_the_controller() {
        let handle = spawn_simulation();
        handle.snapshot(true).await.unwrap();
        // light on, speed 0
        handle.feed(vec![0x10, 24]).await.unwrap();
        let delta = handle.snapshot(true).await.unwrap();
        assert_eq!(delta.trains.len(), 1);
        assert!(delta.trains[0].light);
    }
}

//! Protocol listener.
//!
//! Accepts one client at a time on TCP and, on unix targets, on a Unix
//! socket. A second connection while a client is attached is closed
//! immediately. Bytes read from the client are forwarded to the simulation
//! task as they arrive; delayed sensor reports come back through a channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::shared::{ServiceError, SimulationHandle};

const READ_BUFFER: usize = 256;
const OUTPUT_CAPACITY: usize = 16;

/// Gate allowing a single attached client across every listener.
#[derive(Clone, Debug)]
pub struct ClientSlot {
    permits: Arc<Semaphore>,
}

impl Default for ClientSlot {
    fn default() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }
}

impl ClientSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a client is already attached.
    pub fn try_claim(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }
}

/// Serve protocol clients on `addr` until the listener fails.
pub async fn run_tcp(
    addr: SocketAddr,
    handle: SimulationHandle,
    slot: ClientSlot,
) -> Result<(), ServiceError> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "protocol listener ready");
    loop {
        let (stream, peer) = listener.accept().await?;
        let Some(permit) = slot.try_claim() else {
            warn!(%peer, "client already attached, closing connection");
            drop(stream);
            continue;
        };
        info!(%peer, "client connected");
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_client(stream, &handle).await {
                warn!(%peer, error = %e, "client session ended with error");
            }
            info!(%peer, "client disconnected");
            drop(permit);
        });
    }
}

/// Serve protocol clients on the Unix socket at `path`. A stale socket file
/// is removed first.
#[cfg(unix)]
pub async fn run_unix(
    path: &str,
    handle: SimulationHandle,
    slot: ClientSlot,
) -> Result<(), ServiceError> {
    use tokio::net::UnixListener;

    match std::fs::remove_file(path) {
        Ok(()) => debug!(path, "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let listener = UnixListener::bind(path)?;
    info!(path, "protocol socket ready");
    loop {
        let (stream, _) = listener.accept().await?;
        let Some(permit) = slot.try_claim() else {
            warn!(path, "client already attached, closing connection");
            drop(stream);
            continue;
        };
        info!(path, "client connected");
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_client(stream, &handle).await {
                warn!(error = %e, "client session ended with error");
            }
            info!("client disconnected");
            drop(permit);
        });
    }
}

/// Pump one client until it disconnects.
///
/// The client is detached from the simulation however the session ends.
pub async fn serve_client<S>(stream: S, handle: &SimulationHandle) -> Result<(), ServiceError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (output, outgoing) = mpsc::channel(OUTPUT_CAPACITY);
    handle.attach_client(output).await?;
    let result = pump(stream, handle, outgoing).await;
    let detached = handle.detach_client().await;
    result.and(detached)
}

async fn pump<S>(
    stream: S,
    handle: &SimulationHandle,
    mut outgoing: mpsc::Receiver<Vec<u8>>,
) -> Result<(), ServiceError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = [0u8; READ_BUFFER];
    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }
                debug!(bytes = n, "received");
                handle.feed(buf[..n].to_vec()).await?;
            }
            report = outgoing.recv() => {
                let Some(report) = report else {
                    return Ok(());
                };
                writer.write_all(&report).await?;
                writer.flush().await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TrainConfig};
    use crate::controller::Controller;
    use crate::diagnostics::RecordingSink;
    use crate::geometry::Point2D;
    use crate::sensor::Sensor;
    use crate::services::shared::Simulation;
    use crate::track::Track;
    use crate::train::Train;

    fn spawn_simulation() -> SimulationHandle {
        let mut controller = Controller::with_sink(RecordingSink::new());
        controller.register_track(
            Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0))
                .with_sensor(Sensor::new(9, "A10", 50.0, true, 6.0)),
        );
        let mut train = Train::new(24, TrainConfig::default());
        train.put_on_track(controller.layout(), 1, true).unwrap();
        controller.register_train(train);
        let (simulation, handle) = Simulation::new(controller, &Config::default());
        tokio::spawn(simulation.run());
        handle
    }

    #[test]
    fn slot_admits_one_client() {
        let slot = ClientSlot::new();
        let first = slot.try_claim();
        assert!(first.is_some());
        assert!(slot.clone().try_claim().is_none());
        drop(first);
        assert!(slot.try_claim().is_some());
    }

    #[tokio::test]
    async fn split_command_and_report() {
        let handle = spawn_simulation();
        let (mut client, server) = tokio::io::duplex(64);
        let session = {
            let handle = handle.clone();
            tokio::spawn(async move { serve_client(server, &handle).await })
        };

        // light on for train 24, split across two writes, then a report request
        client.write_all(&[0x10]).await.unwrap();
        client.write_all(&[24, 0x85]).await.unwrap();

        let mut report = [0u8; 2];
        client.read_exact(&mut report).await.unwrap();
        assert_eq!(report, [0x00, 0x40]);

        let delta = handle.snapshot(true).await.unwrap();
        assert!(delta.trains.iter().any(|t| t.id == 24 && t.light));

        drop(client);
        session.await.unwrap().unwrap();
    }
}

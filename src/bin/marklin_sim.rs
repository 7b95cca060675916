//! Marklin layout simulator server.
//!
//! Runs the simulation on a small demonstration layout and exposes:
//! - the Marklin byte protocol on TCP (and a Unix socket on unix targets)
//! - the snapshot API at `http://<host>:<web_port>/api/tick/{full,delta}`
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin marklin-sim               # defaults
//! cargo run --bin marklin-sim -- sim.json   # JSON config file
//! RUST_LOG=debug cargo run --bin marklin-sim
//! ```

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use marklin_sim::services::{run_server, run_tcp, ClientSlot, Simulation, WebServerConfig};
use marklin_sim::{factory, Config, Controller, Train, TracingSink};

const DEMO_SCALE: f64 = 0.5;
const DEMO_TRAIN: u32 = 24;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => Config::default(),
    };
    info!(
        tick_rate_hz = config.simulation.tick_rate_hz,
        protocol_port = config.server.protocol_port,
        web_port = config.server.web_port,
        "marklin-sim v{}",
        env!("CARGO_PKG_VERSION")
    );

    let controller = demo_layout(&config).context("failed to build demo layout")?;
    let (simulation, handle) = Simulation::new(controller, &config);
    tokio::spawn(simulation.run());

    let slot = ClientSlot::new();
    let protocol_addr = SocketAddr::from(([0, 0, 0, 0], config.server.protocol_port));
    {
        let handle = handle.clone();
        let slot = slot.clone();
        tokio::spawn(async move {
            if let Err(e) = run_tcp(protocol_addr, handle, slot).await {
                error!(error = %e, "protocol listener stopped");
            }
        });
    }

    #[cfg(unix)]
    if config.server.has_unix_socket() {
        let handle = handle.clone();
        let slot = slot.clone();
        let path = config.server.unix_socket.to_string();
        tokio::spawn(async move {
            if let Err(e) = marklin_sim::services::run_unix(&path, handle, slot).await {
                error!(error = %e, %path, "protocol socket stopped");
            }
        });
    }

    run_server(handle, WebServerConfig::from_config(&config.server))
        .await
        .context("web server stopped")
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
}

/// A loop with a passing siding between two switches.
fn demo_layout(config: &Config) -> Result<Controller<TracingSink>> {
    let s = DEMO_SCALE;
    let sensors = &config.sensor;
    let mut controller = Controller::new();

    // Main loop
    for track in [
        factory::straight(0x100, 150.0 * s, 100.0 * s, 650.0 * s, 100.0 * s),
        factory::quadrant(0x101, 650.0 * s, 100.0 * s, 700.0 * s, 150.0 * s),
        factory::straight(0x102, 700.0 * s, 150.0 * s, 700.0 * s, 450.0 * s)
            .with_sensor(factory::sensor("A1", 20.0, true, sensors)?)
            .with_sensor(factory::sensor("A2", -20.0, false, sensors)?),
        factory::quadrant(0x103, 700.0 * s, 450.0 * s, 650.0 * s, 500.0 * s),
        factory::straight(0x104, 650.0 * s, 500.0 * s, 150.0 * s, 500.0 * s),
        factory::quadrant(0x105, 150.0 * s, 500.0 * s, 100.0 * s, 450.0 * s),
        factory::straight(0x106, 100.0 * s, 450.0 * s, 100.0 * s, 150.0 * s),
        factory::quadrant(0x107, 100.0 * s, 150.0 * s, 150.0 * s, 100.0 * s),
        // Siding
        factory::quadrant(0x111, 650.0 * s, 100.0 * s, 710.0 * s, 160.0 * s),
        factory::straight(0x112, 710.0 * s, 160.0 * s, 710.0 * s, 440.0 * s),
        factory::quadrant(0x113, 710.0 * s, 440.0 * s, 650.0 * s, 500.0 * s),
        // Switches
        factory::switch(1, 650.0 * s, 100.0 * s),
        factory::switch(2, 650.0 * s, 500.0 * s),
    ] {
        controller.register_track(track);
    }

    let layout = controller.layout_mut();
    for (a, b) in [
        (0x101, 0x102),
        (0x102, 0x103),
        (0x104, 0x105),
        (0x105, 0x106),
        (0x106, 0x107),
        (0x107, 0x100),
        (0x111, 0x112),
        (0x112, 0x113),
    ] {
        layout.connect_auto(a, b)?;
    }
    layout.connect_switch(1, 0x100, 0x101, 0x111)?;
    layout.connect_switch(2, 0x104, 0x103, 0x113)?;

    let mut train = Train::new(DEMO_TRAIN, config.train.clone());
    train.put_on_track(controller.layout(), 0x100, true)?;
    controller.register_train(train);
    Ok(controller)
}

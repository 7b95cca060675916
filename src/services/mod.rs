//! Network services for the simulator.
//!
//! - `shared`: the task owning the [`Controller`](crate::Controller) and the
//!   [`SimulationHandle`] every other service uses to reach it
//! - `marklin_io`: protocol listener (TCP, and a Unix socket on unix targets)
//! - `web`: Axum snapshot API
//!
//! # Wiring
//!
//! ```ignore
//! let (simulation, handle) = Simulation::new(controller, &config);
//! tokio::spawn(simulation.run());
//!
//! let slot = ClientSlot::new();
//! tokio::spawn(run_tcp(addr, handle.clone(), slot.clone()));
//! run_server(handle, WebServerConfig::from_config(&config.server)).await?;
//! ```

pub mod api;
pub mod marklin_io;
pub mod shared;
pub mod web;

// Re-exports
pub use api::*;
pub use marklin_io::*;
pub use shared::*;
pub use web::*;

//! Simulation and server configuration.
//!
//! Uses `heapless::String` for short labels and paths, keeping the
//! configuration plain data that can be copied into every component.
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::config::{Config, ServerConfig, SimulationConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.simulation.tick_rate_hz, 120);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_simulation(SimulationConfig::default().with_tick_rate_hz(60))
//!     .with_server(ServerConfig::default().with_protocol_port(4000));
//! ```

use heapless::String as HString;
use serde::{Deserialize, Serialize};

/// Maximum length for labels (sensor and switch names)
pub const MAX_LABEL: usize = 8;

/// Maximum length for longer config strings (socket paths)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short display labels
pub type Label = HString<MAX_LABEL>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a Label from a &str, truncating if too long
pub fn label(s: &str) -> Label {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tick loop configuration
    pub simulation: SimulationConfig,
    /// Physical constants shared by every train
    pub train: TrainConfig,
    /// Sensor behaviour
    pub sensor: SensorConfig,
    /// Listener configuration
    pub server: ServerConfig,
}

impl Config {
    /// Set simulation configuration
    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    /// Set train configuration
    pub fn with_train(mut self, train: TrainConfig) -> Self {
        self.train = train;
        self
    }

    /// Set sensor configuration
    pub fn with_sensor(mut self, sensor: SensorConfig) -> Self {
        self.sensor = sensor;
        self
    }

    /// Set server configuration
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }
}

// ============================================================================
// Simulation Config
// ============================================================================

/// Tick loop configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per second
    pub tick_rate_hz: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 120 }
    }
}

impl SimulationConfig {
    /// Set the tick rate (at least 1 Hz)
    pub fn with_tick_rate_hz(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Length of one tick in milliseconds
    pub fn tick_interval_ms(&self) -> f64 {
        1000.0 / self.tick_rate_hz.max(1) as f64
    }
}

// ============================================================================
// Train Config
// ============================================================================

/// Physical constants of a train
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Layout units per second travelled per speed step
    pub speed_multiplier: f64,
    /// Milliseconds between two speed steps while accelerating
    pub accelerate_interval_ms: f64,
    /// Body length
    pub length: f64,
    /// Body width
    pub width: f64,
    /// Distance from each wheel to the nearest end of the body
    pub wheel_offset: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 64.0 / 14.0,
            accelerate_interval_ms: 3800.0 / 14.0,
            length: 21.6,
            width: 3.5,
            wheel_offset: 4.9,
        }
    }
}

impl TrainConfig {
    /// Set the speed multiplier
    pub fn with_speed_multiplier(mut self, multiplier: f64) -> Self {
        self.speed_multiplier = multiplier;
        self
    }

    /// Set the per-step acceleration interval
    pub fn with_accelerate_interval_ms(mut self, ms: f64) -> Self {
        self.accelerate_interval_ms = ms;
        self
    }

    /// Set the body dimensions and wheel offset
    pub fn with_body(mut self, length: f64, width: f64, wheel_offset: f64) -> Self {
        self.length = length;
        self.width = width;
        self.wheel_offset = wheel_offset;
        self
    }

    /// Distance kept between the two wheels
    pub fn wheel_spacing(&self) -> f64 {
        self.length - 2.0 * self.wheel_offset
    }
}

// ============================================================================
// Sensor Config
// ============================================================================

/// Sensor behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Length of track around a sensor that triggers it
    pub trigger_width: f64,
    /// Delay between a report request and the reply
    pub report_delay_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trigger_width: 6.0,
            report_delay_ms: 100,
        }
    }
}

impl SensorConfig {
    /// Set the trigger width
    pub fn with_trigger_width(mut self, width: f64) -> Self {
        self.trigger_width = width;
        self
    }

    /// Set the report delay
    pub fn with_report_delay_ms(mut self, ms: u64) -> Self {
        self.report_delay_ms = ms;
        self
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// Listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port of the protocol listener
    pub protocol_port: u16,
    /// Unix socket path of the protocol listener (empty = disabled)
    pub unix_socket: LongString,
    /// Port of the web snapshot API
    pub web_port: u16,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol_port: 3018,
            unix_socket: long_string("/tmp/marklinsim.sock"),
            web_port: 8080,
            cors_permissive: true,
        }
    }
}

impl ServerConfig {
    /// Set the protocol port
    pub fn with_protocol_port(mut self, port: u16) -> Self {
        self.protocol_port = port;
        self
    }

    /// Set the unix socket path (empty disables it)
    pub fn with_unix_socket(mut self, path: &str) -> Self {
        self.unix_socket = long_string(path);
        self
    }

    /// Set the web port
    pub fn with_web_port(mut self, port: u16) -> Self {
        self.web_port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Check if the unix socket listener is configured
    pub fn has_unix_socket(&self) -> bool {
        !self.unix_socket.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.simulation.tick_rate_hz, 120);
        assert_eq!(config.sensor.report_delay_ms, 100);
        assert_eq!(config.server.protocol_port, 3018);
        assert_eq!(config.server.unix_socket.as_str(), "/tmp/marklinsim.sock");
    }

    #[test]
    fn train_defaults_match_layout_scale() {
        let train = TrainConfig::default();
        assert!((train.speed_multiplier * 14.0 - 64.0).abs() < 1e-9);
        assert!((train.accelerate_interval_ms * 14.0 - 3800.0).abs() < 1e-9);
        assert!((train.wheel_spacing() - 11.8).abs() < 1e-9);
    }

    #[test]
    fn tick_interval() {
        let sim = SimulationConfig::default().with_tick_rate_hz(100);
        assert_eq!(sim.tick_interval_ms(), 10.0);

        let sim = SimulationConfig::default().with_tick_rate_hz(0);
        assert_eq!(sim.tick_rate_hz, 1);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_train(TrainConfig::default().with_body(30.0, 4.0, 5.0))
            .with_sensor(SensorConfig::default().with_trigger_width(2.0))
            .with_server(
                ServerConfig::default()
                    .with_protocol_port(4000)
                    .with_web_port(3000)
                    .with_unix_socket(""),
            );

        assert_eq!(config.train.length, 30.0);
        assert_eq!(config.train.wheel_spacing(), 20.0);
        assert_eq!(config.sensor.trigger_width, 2.0);
        assert_eq!(config.server.protocol_port, 4000);
        assert_eq!(config.server.web_port, 3000);
        assert!(!config.server.has_unix_socket());
    }

    #[test]
    fn label_truncation() {
        let s = label("ABCDEFGHIJKL");
        assert_eq!(s.as_str(), "ABCDEFGH");
        let long_input = "b".repeat(200);
        assert!(long_string(&long_input).len() <= MAX_LONG_STRING);
    }

    #[test]
    fn label_utf8_boundary() {
        // Each character is 3 bytes; only two fit in eight bytes
        let s = label("äöüäöü");
        assert!(s.len() <= MAX_LABEL);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }

    #[test]
    fn json_round_trip_with_missing_fields() {
        let json = r#"{"server": {"protocol_port": 5000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.protocol_port, 5000);
        assert_eq!(config.server.web_port, 8080);
        assert_eq!(config.simulation.tick_rate_hz, 120);
    }
}
